use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Editor configuration. Every field has a default, so an empty JSON object
/// (or no file at all) yields [`EditorConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub autosave: AutosaveConfig,
    /// Maximum excerpt length in characters before `...` is appended.
    pub excerpt_length: usize,
    /// Largest accepted image upload.
    pub max_image_bytes: usize,
    /// Title saved for posts the user left untitled.
    pub untitled_title: String,
    pub storage: StorageKeys,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave: AutosaveConfig::default(),
            excerpt_length: 160,
            max_image_bytes: 5 * 1024 * 1024,
            untitled_title: "Untitled Post".to_owned(),
            storage: StorageKeys::default(),
        }
    }
}

impl EditorConfig {
    /// Load from a JSON file. A missing file gives the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let key = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).map_err(|e| match e {
                StoreError::Serialization { source, .. } => StoreError::serialization(key, source),
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %key, "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::serialization("config", e))
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let key = path.display().to_string();
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::serialization(key.clone(), e))?;
        std::fs::write(path, raw).map_err(|e| StoreError::io(key, e))
    }
}

/// Debounce and throttle windows for autosave, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub throttle_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            throttle_ms: 2000,
        }
    }
}

impl AutosaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Key names used in the key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub posts_key: String,
    pub blob_prefix: String,
    pub blob_index_key: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            posts_key: "posts-index".to_owned(),
            blob_prefix: "blob-".to_owned(),
            blob_index_key: "blob-index".to_owned(),
        }
    }
}
