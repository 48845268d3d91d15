//! quill-editor-core: document model and media bookkeeping for the quill post editor.
//!
//! This crate provides:
//! - `Fragment` / `Element` - a tolerant markup tree that round-trips untouched regions
//! - `ContentNode` - typed image, youtube, html and bookmark nodes
//! - `InsertRequest` / `insert_media` - validated insertion with out-of-band media records
//! - `extract` / `rehydrate` / `cleanup_orphans` - keeping markup and media records in step
//! - `PostRepository` - the post index
//! - `EditorSession` - one open post with debounced, throttled autosave

pub mod autosave;
pub mod cleanup;
pub mod extract;
pub mod insert;
pub mod markup;
pub mod metadata;
pub mod nodes;
pub mod post;
pub mod rehydrate;
pub mod repository;
pub mod session;
pub mod surface;

pub use autosave::AutosaveScheduler;
pub use cleanup::{cleanup_orphans, referenced_ids};
pub use extract::{extract, extract_from, extract_with_store};
pub use insert::{
    ImageUpload, InsertRequest, Insertion, PreparedInsert, insert_media, picsum_image_id,
};
pub use markup::{Attribute, Element, Fragment, Node, Visit};
#[cfg(feature = "fetch")]
pub use metadata::HttpMetadataFetcher;
pub use metadata::{
    FallbackFetcher, LinkMetadata, MetadataFetcher, fallback_metadata, metadata_from_html,
};
pub use nodes::{
    BookmarkNode, ContentNode, HtmlEmbedNode, ImageNode, YouTubeNode, youtube_video_id,
};
pub use post::{Post, PostId, PostStatus, make_excerpt};
pub use rehydrate::{Rehydrated, RehydrateWarning, rehydrate, resolve_cover_image};
pub use repository::PostRepository;
pub use session::{
    AutosaveOutcome, BookmarkRequest, EditorSession, OpenOutcome, PostRoute, SessionState,
};
pub use surface::{EditingSurface, MarkupBuffer};

pub use quill_common::{BlobStore, EditorConfig, MediaId, MediaKind, MediaRecord, QuillError};
