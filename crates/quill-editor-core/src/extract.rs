//! Media Reference Extractor: which media ids does a post body use?
//!
//! Extraction never fails. Markup that does not parse is logged and treated
//! as referencing nothing.

use quill_common::{BlobStore, KeyValueStore, MediaId, MediaKind};

use crate::markup::{Fragment, Visit};
use crate::nodes::ContentNode;

/// References found in one walk, grouped by pass.
#[derive(Debug, Default)]
struct Scan {
    youtube: Vec<MediaId>,
    html: Vec<MediaId>,
    images: Vec<MediaId>,
    bookmarks: Vec<MediaId>,
    /// `src` of every image, for the fallback pass.
    image_srcs: Vec<String>,
}

impl Scan {
    fn of(fragment: &Fragment) -> Self {
        let mut scan = Scan::default();
        fragment.visit_elements(|el| {
            let Some(node) = ContentNode::from_element(el) else {
                return Visit::Descend;
            };
            let id = node.media_id();
            match node {
                ContentNode::Image(image) => {
                    scan.image_srcs.push(image.src);
                    scan.images.extend(id);
                    return Visit::Descend;
                }
                ContentNode::YouTube(_) => scan.youtube.extend(id),
                ContentNode::Html(_) => scan.html.extend(id),
                ContentNode::Bookmark(_) => scan.bookmarks.extend(id),
            }
            // embeds own their subtree
            Visit::SkipChildren
        });
        scan
    }

    /// Whether the youtube, html or image passes found anything. Bookmarks
    /// do not count.
    fn has_embed_ids(&self) -> bool {
        !(self.youtube.is_empty() && self.html.is_empty() && self.images.is_empty())
    }

    fn into_ids(self) -> Vec<MediaId> {
        dedup([self.youtube, self.html, self.images, self.bookmarks])
    }
}

fn dedup<const N: usize>(groups: [Vec<MediaId>; N]) -> Vec<MediaId> {
    let mut ids = Vec::new();
    for id in groups.into_iter().flatten() {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn parse_or_empty(markup: &str) -> Option<Fragment> {
    match Fragment::parse(markup) {
        Ok(fragment) => Some(fragment),
        Err(e) => {
            tracing::warn!(error = %e, offset = e.offset(), "markup did not parse, no media references found");
            None
        }
    }
}

/// Media ids referenced by `markup`, deduplicated, in order of discovery.
pub fn extract(markup: &str) -> Vec<MediaId> {
    parse_or_empty(markup)
        .map(|fragment| extract_from(&fragment))
        .unwrap_or_default()
}

/// [`extract`] over an already parsed fragment.
pub fn extract_from(fragment: &Fragment) -> Vec<MediaId> {
    Scan::of(fragment).into_ids()
}

/// [`extract`], plus recovery for content written before media ids existed:
/// when no youtube, html or image node carries an id but images are
/// present, any stored image record whose data is byte-identical to an
/// image `src` counts as referenced. Bookmark ids are kept either way.
pub fn extract_with_store<S: KeyValueStore>(markup: &str, blobs: &BlobStore<S>) -> Vec<MediaId> {
    let Some(fragment) = parse_or_empty(markup) else {
        return Vec::new();
    };
    let scan = Scan::of(&fragment);
    if scan.has_embed_ids() || scan.image_srcs.is_empty() {
        return scan.into_ids();
    }

    let records = match blobs.records() {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "could not enumerate media records for fallback matching");
            return scan.into_ids();
        }
    };
    let recovered: Vec<MediaId> = records
        .into_iter()
        .filter(|record| record.kind() == MediaKind::Image)
        .filter(|record| {
            record
                .image_data()
                .is_some_and(|data| scan.image_srcs.iter().any(|src| src == data))
        })
        .map(|record| record.id)
        .collect();
    if !recovered.is_empty() {
        tracing::debug!(count = recovered.len(), "matched id-less images to stored records");
    }
    dedup([recovered, scan.bookmarks])
}
