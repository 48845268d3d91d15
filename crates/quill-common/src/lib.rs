//! quill-common: storage and shared types for the quill post editor.
//!
//! This crate provides:
//! - `KeyValueStore` - the persistence capability, with `MemoryStore` and `FileStore`
//! - `BlobStore` - out-of-band media records plus their id index
//! - `MediaId` / `MediaRecord` - the media vocabulary shared with markup
//! - `EditorConfig` - autosave windows, limits and storage key names
//! - the error taxonomy used across the workspace

pub mod blob;
pub mod config;
pub mod error;
pub mod filestore;
pub mod kv;
pub mod media;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use blob::{BlobStore, IndexReport};
pub use config::{AutosaveConfig, EditorConfig, StorageKeys};
pub use error::{MarkupError, MarkupErrorKind, QuillError, StoreError, ValidationError};
pub use filestore::FileStore;
pub use kv::{KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use media::{MediaId, MediaKind, MediaPayload, MediaRecord};
pub use smol_str::SmolStr;
