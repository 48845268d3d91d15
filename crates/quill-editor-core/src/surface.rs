//! The editing surface seam.
//!
//! The session drives whatever widget actually edits the body through
//! [`EditingSurface`]. [`MarkupBuffer`] is the headless implementation used
//! by tests and by hosts without a live editor.

use crate::markup::Fragment;

pub trait EditingSurface {
    /// Current body markup.
    fn markup(&self) -> String;

    /// Replace the whole body.
    fn set_markup(&mut self, markup: &str);

    /// Insert a fragment at the cursor.
    fn insert_fragment(&mut self, fragment: &Fragment);

    /// Plain-text rendering of the body. Unparsable markup has no text.
    fn plain_text(&self) -> String {
        match Fragment::parse(&self.markup()) {
            Ok(fragment) => fragment.plain_text(),
            Err(e) => {
                tracing::warn!(error = %e, "surface markup did not parse");
                String::new()
            }
        }
    }
}

/// A markup string with a block-level cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkupBuffer {
    markup: String,
    /// Index of the top-level node the cursor sits before. `None` is the end.
    cursor: Option<usize>,
}

impl MarkupBuffer {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            cursor: None,
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Place the cursor before the top-level node at `index`, or at the end.
    pub fn set_cursor(&mut self, index: Option<usize>) {
        self.cursor = index;
    }
}

impl EditingSurface for MarkupBuffer {
    fn markup(&self) -> String {
        self.markup.clone()
    }

    fn set_markup(&mut self, markup: &str) {
        self.markup = markup.to_owned();
        self.cursor = None;
    }

    fn insert_fragment(&mut self, fragment: &Fragment) {
        let Some(index) = self.cursor else {
            self.markup.push_str(&fragment.to_html());
            return;
        };
        match Fragment::parse(&self.markup) {
            Ok(mut doc) => {
                let at = index.min(doc.nodes.len());
                doc.nodes.splice(at..at, fragment.nodes.iter().cloned());
                self.markup = doc.to_html();
                self.cursor = Some(at + fragment.nodes.len());
            }
            Err(e) => {
                tracing::warn!(error = %e, "buffer markup did not parse, appending at the end");
                self.markup.push_str(&fragment.to_html());
                self.cursor = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Element;

    fn divider() -> Fragment {
        let mut fragment = Fragment::new();
        fragment.push(Element::new("hr"));
        fragment
    }

    #[test]
    fn appends_without_cursor() {
        let mut buffer = MarkupBuffer::new("<p>a</p>");
        buffer.insert_fragment(&divider());
        assert_eq!(buffer.markup(), "<p>a</p><hr>");
        assert_eq!(buffer.plain_text(), "a");
    }

    #[test]
    fn inserts_at_cursor_and_advances() {
        let mut buffer = MarkupBuffer::new("<p>a</p><p>b</p>");
        buffer.set_cursor(Some(1));
        buffer.insert_fragment(&divider());
        buffer.insert_fragment(&divider());
        assert_eq!(buffer.markup(), "<p>a</p><hr><hr><p>b</p>");
        assert_eq!(buffer.cursor(), Some(3));
    }
}
