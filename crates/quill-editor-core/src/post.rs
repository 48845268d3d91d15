//! The post model as persisted in the post index.

use std::fmt;

use chrono::{DateTime, Utc};
use quill_common::MediaId;
use serde::{Deserialize, Deserializer, Serialize};

use crate::markup::Fragment;

/// Post identifier: the creation time in unix milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl PostId {
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(created: DateTime<Utc>) -> Self {
        Self(created.timestamp_millis())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    #[serde(default)]
    pub title: String,
    /// Body markup.
    #[serde(default, alias = "bodyMarkup")]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub cover_image_id: Option<MediaId>,
    /// Media referenced by the body, in discovery order. Never null.
    #[serde(default, alias = "imageIds", deserialize_with = "null_as_empty")]
    pub media_ids: Vec<MediaId>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Post {
    /// An empty draft created at `now`, identified by its creation time.
    pub fn new_draft(now: DateTime<Utc>) -> Self {
        Self {
            id: PostId::at(now),
            title: String::new(),
            content: String::new(),
            excerpt: String::new(),
            status: PostStatus::Draft,
            cover_image_id: None,
            media_ids: Vec::new(),
            author: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Plain-text rendering of the body. Unparsable markup is used as-is.
    pub fn plain_text(&self) -> String {
        match Fragment::parse(&self.content) {
            Ok(fragment) => fragment.plain_text(),
            Err(e) => {
                tracing::warn!(post_id = %self.id, error = %e, "post body did not parse, using raw markup as text");
                self.content.trim().to_owned()
            }
        }
    }

    /// Whether the title or the body has any visible text.
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.plain_text().trim().is_empty()
    }
}

/// First `max_chars` characters of `text`, with `...` appended only when
/// something was cut.
pub fn make_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_at_char_boundary() {
        let text = "a".repeat(300);
        let excerpt = make_excerpt(&text, 160);
        assert_eq!(excerpt.len(), 163);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().filter(|c| *c == 'a').count(), 160);

        assert_eq!(make_excerpt("short", 160), "short");
        assert_eq!(make_excerpt("", 160), "");
        assert_eq!(make_excerpt("héllo wörld", 4), "héll...");
    }

    #[test]
    fn legacy_json_normalizes_media_ids() {
        let raw = r#"{
            "id": 1700000000000,
            "title": "Old",
            "content": "<p>x</p>",
            "excerpt": "x...",
            "status": "published",
            "coverImage": null,
            "author": "Admin",
            "readTime": "1 min read",
            "tags": [],
            "imageIds": null,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, PostId(1_700_000_000_000));
        assert!(post.media_ids.is_empty());
        assert!(post.is_published());
        assert_eq!(post.author.as_deref(), Some("Admin"));

        let without: Post = serde_json::from_str(
            r#"{"id": 1, "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(without.media_ids.is_empty());
        assert_eq!(without.status, PostStatus::Draft);
    }

    #[test]
    fn serializes_camel_case() {
        let mut post = Post::new_draft(DateTime::from_timestamp_millis(5).unwrap());
        post.media_ids.push(MediaId::new("youtube_1_1"));
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["id"], 5);
        assert_eq!(json["mediaIds"][0], "youtube_1_1");
        assert_eq!(json["status"], "draft");
        assert!(json["coverImageId"].is_null());
    }

    #[test]
    fn content_check_looks_at_visible_text() {
        let mut post = Post::new_draft(Utc::now());
        assert!(!post.has_content());
        post.content = "<p> </p><p></p>".into();
        assert!(!post.has_content());
        post.content = "<p>hi</p>".into();
        assert!(post.has_content());
    }
}
