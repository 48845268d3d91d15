//! Debounced, throttled autosave timing.
//!
//! The scheduler owns one pending-deadline slot and the time of the last
//! save. It does no I/O and reads no clock: callers pass `now` in and act on
//! what [`AutosaveScheduler::poll`] returns.

use std::time::Duration;

use quill_common::AutosaveConfig;
use web_time::Instant;

#[derive(Clone, Debug)]
pub struct AutosaveScheduler {
    debounce: Duration,
    throttle: Duration,
    /// When the debounce window of the latest edit closes.
    pending: Option<Instant>,
    last_fired: Option<Instant>,
}

impl AutosaveScheduler {
    pub fn new(config: &AutosaveConfig) -> Self {
        Self::with_windows(config.debounce(), config.throttle())
    }

    pub fn with_windows(debounce: Duration, throttle: Duration) -> Self {
        Self {
            debounce,
            throttle,
            pending: None,
            last_fired: None,
        }
    }

    /// Record an edit. Restarts the debounce window.
    pub fn note_edit(&mut self, now: Instant) {
        self.pending = Some(now + self.debounce);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending save may fire: the end of the debounce window, or
    /// the end of the throttle window if that is later.
    pub fn next_deadline(&self) -> Option<Instant> {
        let due = self.pending?;
        Some(match self.last_fired {
            Some(last) => due.max(last + self.throttle),
            None => due,
        })
    }

    /// Returns true when a save should run now. Firing clears the pending
    /// slot.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                self.last_fired = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Drop the pending save, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Record a save made outside the scheduler.
    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduler() -> AutosaveScheduler {
        AutosaveScheduler::new(&AutosaveConfig::default())
    }

    #[test]
    fn fires_after_quiet_debounce_window() {
        let t0 = Instant::now();
        let mut s = scheduler();
        assert!(!s.poll(t0));
        s.note_edit(t0);
        assert!(!s.poll(t0 + ms(999)));
        assert!(s.poll(t0 + ms(1000)));
        assert!(!s.is_pending());
        assert!(!s.poll(t0 + ms(5000)));
    }

    #[test]
    fn edits_restart_the_debounce() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.note_edit(t0);
        s.note_edit(t0 + ms(800));
        assert!(!s.poll(t0 + ms(1000)));
        assert_eq!(s.next_deadline(), Some(t0 + ms(1800)));
        assert!(s.poll(t0 + ms(1800)));
    }

    #[test]
    fn throttle_defers_to_end_of_window() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.note_edit(t0);
        assert!(s.poll(t0 + ms(1000)));

        s.note_edit(t0 + ms(1100));
        // debounce closes at 2100 but the last save was at 1000
        assert_eq!(s.next_deadline(), Some(t0 + ms(3000)));
        assert!(!s.poll(t0 + ms(2500)));
        assert!(s.poll(t0 + ms(3000)));
    }

    #[test]
    fn cancel_and_external_saves() {
        let t0 = Instant::now();
        let mut s = scheduler();
        s.note_edit(t0);
        s.cancel();
        assert!(!s.poll(t0 + ms(10_000)));

        s.mark_fired(t0 + ms(10_000));
        s.note_edit(t0 + ms(10_100));
        assert_eq!(s.next_deadline(), Some(t0 + ms(12_000)));
    }
}
