//! Media identifiers and the records stored out-of-band for them.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

/// Opaque identifier linking a markup node to its [`MediaRecord`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(SmolStr);

impl MediaId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id: `{kind}_{unix_millis}_{0..=9999}`.
    ///
    /// No uniqueness check is performed; two ids minted for the same kind in
    /// the same millisecond collide with probability 1/10000.
    pub fn generate(kind: MediaKind) -> Self {
        Self::generate_at(kind, Utc::now())
    }

    pub fn generate_at(kind: MediaKind, at: DateTime<Utc>) -> Self {
        let suffix: u32 = rand::rng().random_range(0..10000);
        Self(format_smolstr!(
            "{}_{}_{}",
            kind.as_str(),
            at.timestamp_millis(),
            suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kind prefix of a generated id, if it has one.
    pub fn kind_hint(&self) -> Option<MediaKind> {
        let (prefix, _) = self.0.split_once('_')?;
        MediaKind::parse(prefix)
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for MediaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Discriminator for embeddable media.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Youtube,
    Html,
    Bookmark,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Youtube => "youtube",
            MediaKind::Html => "html",
            MediaKind::Bookmark => "bookmark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" | "img" => Some(MediaKind::Image),
            "youtube" => Some(MediaKind::Youtube),
            "html" => Some(MediaKind::Html),
            "bookmark" => Some(MediaKind::Bookmark),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of a [`MediaRecord`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaPayload {
    #[serde(rename_all = "camelCase")]
    Image {
        /// Image bytes as a `data:` URL
        data: String,
        name: String,
        #[serde(default)]
        size: usize,
        #[serde(default)]
        mime_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Youtube { video_id: String, url: String },
    #[serde(rename_all = "camelCase")]
    Html { html_content: String },
    #[serde(rename_all = "camelCase")]
    Bookmark {
        url: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        image: String,
        #[serde(default)]
        favicon: String,
        #[serde(default)]
        site: String,
    },
}

impl MediaPayload {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaPayload::Image { .. } => MediaKind::Image,
            MediaPayload::Youtube { .. } => MediaKind::Youtube,
            MediaPayload::Html { .. } => MediaKind::Html,
            MediaPayload::Bookmark { .. } => MediaKind::Bookmark,
        }
    }
}

/// Value stored in the blob store under `blob-<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    #[serde(flatten)]
    pub payload: MediaPayload,
    pub timestamp: DateTime<Utc>,
}

impl MediaRecord {
    pub fn new(id: MediaId, payload: MediaPayload) -> Self {
        Self {
            id,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.payload.kind()
    }

    /// Data URL of an image record.
    pub fn image_data(&self) -> Option<&str> {
        match &self.payload {
            MediaPayload::Image { data, .. } => Some(data),
            _ => None,
        }
    }
}
