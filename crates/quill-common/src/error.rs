//! Error types for quill.
//!
//! Each concern gets its own enum so call sites can match on what they can
//! actually recover from; [`QuillError`] wraps them for callers that just want
//! to bubble everything up.

use std::borrow::Cow;

use miette::{Diagnostic, NamedSource, SourceOffset, SourceSpan};

use crate::media::MediaId;

/// Main error type for quill operations
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum QuillError {
    /// User input rejected before anything was changed
    #[error(transparent)]
    #[diagnostic_source]
    Validation(#[from] ValidationError),

    /// Key-value backend failure
    #[error(transparent)]
    #[diagnostic_source]
    Storage(#[from] StoreError),

    /// Markup could not be parsed
    #[error(transparent)]
    #[diagnostic_source]
    Markup(#[from] MarkupError),

    /// A referenced media record does not exist
    #[error("media record not found: {0}")]
    #[diagnostic(code(quill::not_found::media))]
    MediaNotFound(MediaId),

    /// A post id did not resolve to a stored post
    #[error("post not found: {0}")]
    #[diagnostic(code(quill::not_found::post))]
    PostNotFound(i64),

    /// An operation was called in a session state that does not allow it
    #[error("invalid editor state: {0}")]
    #[diagnostic(code(quill::state))]
    InvalidState(String),
}

/// Input validation failures. Recoverable: the user corrects input and retries.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    #[diagnostic(code(quill::validation::empty))]
    Empty(&'static str),

    #[error("invalid URL: {0}")]
    #[diagnostic(code(quill::validation::url), help("enter an absolute http(s) URL"))]
    InvalidUrl(String),

    #[error("invalid YouTube URL: {0}")]
    #[diagnostic(
        code(quill::validation::youtube),
        help("use a youtube.com/watch?v=, youtu.be/ or youtube.com/embed/ link")
    )]
    InvalidYouTubeUrl(String),

    #[error("file too large: {size} bytes (maximum {max})")]
    #[diagnostic(code(quill::validation::too_large))]
    FileTooLarge { size: usize, max: usize },

    #[error("not an image: {0}")]
    #[diagnostic(code(quill::validation::not_image))]
    NotAnImage(String),

    #[error("invalid Picsum image: {0}")]
    #[diagnostic(
        code(quill::validation::picsum),
        help("enter an image id between 0 and 1084, or a picsum.photos/id/N link")
    )]
    InvalidPicsumId(String),
}

/// Storage backend failures.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum StoreError {
    /// The backend refused the write because it is full.
    #[error("storage quota exceeded writing {key}: {needed} bytes needed, {available} available")]
    #[diagnostic(code(quill::storage::quota))]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// Value could not be encoded or decoded.
    #[error("serialization error for {key}: {source}")]
    #[diagnostic(code(quill::storage::serde))]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The key is reserved for bookkeeping and cannot hold a record.
    #[error("storage key {key} is reserved")]
    #[diagnostic(code(quill::storage::reserved), help("choose a different media id"))]
    ReservedKey { key: String },

    /// Backend I/O failure.
    #[error("storage I/O error for {key}: {source}")]
    #[diagnostic(code(quill::storage::io))]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            source,
        }
    }

    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Markup parse error with source location information
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("markup parse error: {kind}")]
#[diagnostic(code(quill::markup))]
pub struct MarkupError {
    kind: MarkupErrorKind,
    #[source_code]
    src: NamedSource<Cow<'static, str>>,
    #[label("here")]
    err_location: SourceSpan,
    #[help]
    advice: Option<String>,
}

impl MarkupError {
    pub fn new(kind: MarkupErrorKind, offset: usize, len: usize) -> Self {
        Self {
            kind,
            src: NamedSource::new(Cow::Borrowed("markup"), Cow::Borrowed("")),
            err_location: SourceSpan::new(SourceOffset::from(offset), len),
            advice: None,
        }
    }

    /// Attach the markup the error was produced from, for rendering.
    pub fn with_source(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            src: NamedSource::new(Cow::Owned(name.into()), Cow::Owned(source.into())),
            ..self
        }
    }

    /// Attach a hint shown under the diagnostic.
    pub fn with_advice(self, advice: impl Into<String>) -> Self {
        Self {
            advice: Some(advice.into()),
            ..self
        }
    }

    pub fn kind(&self) -> &MarkupErrorKind {
        &self.kind
    }

    pub fn offset(&self) -> usize {
        self.err_location.offset()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarkupErrorKind {
    #[error("unterminated tag <{0}")]
    UnterminatedTag(String),
    #[error("unterminated attribute value for {0}")]
    UnterminatedAttribute(String),
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated declaration")]
    UnterminatedDeclaration,
}
