//! Document Rehydrator: reconcile a loaded post body with its media records.
//!
//! Ids are processed in the order given. Each record either re-syncs the
//! node already tagged with its id or, for youtube and html embeds, appends a
//! fresh block at the end of the body. Nodes are always searched for by id
//! before appending, so running the rehydrator twice adds nothing the second
//! time. When nothing needed changing the input markup is returned verbatim.

use std::fmt;

use quill_common::{BlobStore, KeyValueStore, MediaId, MediaRecord};

use crate::markup::{Element, Fragment};
use crate::nodes::{
    ATTR_IMAGE_ID, ATTR_IMAGE_NAME, ATTR_MEDIA_ID, BookmarkNode, ContentNode, HtmlEmbedNode,
    YouTubeNode,
};
use crate::post::Post;

/// Something the rehydrator skipped. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RehydrateWarning {
    /// The id is listed on the post but has no stored record.
    MissingRecord(MediaId),
    /// The body did not parse and was left untouched.
    UnparsableMarkup(String),
}

impl fmt::Display for RehydrateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RehydrateWarning::MissingRecord(id) => write!(f, "no media record for {id}"),
            RehydrateWarning::UnparsableMarkup(e) => write!(f, "markup left as-is: {e}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rehydrated {
    pub markup: String,
    pub warnings: Vec<RehydrateWarning>,
}

impl Rehydrated {
    fn unchanged(markup: &str, warnings: Vec<RehydrateWarning>) -> Self {
        Self {
            markup: markup.to_owned(),
            warnings,
        }
    }
}

pub fn rehydrate<S: KeyValueStore>(
    markup: &str,
    media_ids: &[MediaId],
    blobs: &BlobStore<S>,
) -> Rehydrated {
    if media_ids.is_empty() {
        return Rehydrated::unchanged(markup, Vec::new());
    }
    let mut fragment = match Fragment::parse(markup) {
        Ok(fragment) => fragment,
        Err(e) => {
            tracing::warn!(error = %e, offset = e.offset(), "skipping rehydration of unparsable markup");
            return Rehydrated::unchanged(
                markup,
                vec![RehydrateWarning::UnparsableMarkup(e.to_string())],
            );
        }
    };

    let mut warnings = Vec::new();
    let mut changed = false;
    for id in media_ids {
        let Some(record) = blobs.get(id) else {
            tracing::warn!(media_id = %id, "referenced media record is missing, skipping");
            warnings.push(RehydrateWarning::MissingRecord(id.clone()));
            continue;
        };
        changed |= apply(&mut fragment, &record);
    }

    if changed {
        Rehydrated {
            markup: fragment.to_html(),
            warnings,
        }
    } else {
        Rehydrated::unchanged(markup, warnings)
    }
}

fn tagged_with(el: &Element, id: &MediaId) -> bool {
    el.attr(ATTR_MEDIA_ID) == Some(id.as_str())
}

/// Apply one record to the tree. Returns whether the tree changed.
fn apply(fragment: &mut Fragment, record: &MediaRecord) -> bool {
    let id = &record.id;
    match ContentNode::from_payload(id, &record.payload) {
        ContentNode::Image(image) => {
            let src = image.src.as_str();
            match fragment.find_element_mut(|el| el.is("img") && el.attr("src") == Some(src)) {
                Some(img) => {
                    let mut changed = img.set_attr(ATTR_IMAGE_ID, id.as_str());
                    if let Some(name) = &image.name {
                        changed |= img.set_attr(ATTR_IMAGE_NAME, name.as_str());
                    }
                    changed
                }
                None => {
                    tracing::debug!(media_id = %id, "no image with matching data, leaving markup alone");
                    false
                }
            }
        }
        ContentNode::YouTube(node) => {
            match fragment.find_element_mut(|el| YouTubeNode::matches(el) && tagged_with(el, id)) {
                Some(el) => node.sync_element(el),
                None => {
                    tracing::info!(media_id = %id, "restoring missing youtube embed");
                    fragment.push(node.to_element());
                    true
                }
            }
        }
        ContentNode::Html(node) => {
            match fragment.find_element_mut(|el| HtmlEmbedNode::matches(el) && tagged_with(el, id)) {
                Some(el) => node.sync_element(el),
                None => {
                    tracing::info!(media_id = %id, "restoring missing html embed");
                    fragment.push(node.to_element());
                    true
                }
            }
        }
        ContentNode::Bookmark(node) => {
            match fragment.find_element_mut(|el| BookmarkNode::matches(el) && tagged_with(el, id)) {
                Some(el) => node.sync_element(el),
                None => {
                    tracing::debug!(media_id = %id, "bookmark card not in markup, not restoring");
                    false
                }
            }
        }
    }
}

/// Data URL of the post's cover image, if it has one and it is stored.
pub fn resolve_cover_image<S: KeyValueStore>(post: &Post, blobs: &BlobStore<S>) -> Option<String> {
    let id = post.cover_image_id.as_ref()?;
    match blobs.get(id) {
        Some(record) => match record.image_data() {
            Some(data) => Some(data.to_owned()),
            None => {
                tracing::warn!(media_id = %id, kind = %record.kind(), "cover image record is not an image");
                None
            }
        },
        None => {
            tracing::warn!(media_id = %id, post_id = %post.id, "cover image record is missing");
            None
        }
    }
}
