//! Orphan cleanup: drop media records no document refers to any more.

use std::collections::HashSet;

use quill_common::{BlobStore, KeyValueStore, MediaId, StoreError};

use crate::extract::extract_with_store;

/// Every media id referenced by any of `markups`.
pub fn referenced_ids<'a, S, I>(blobs: &BlobStore<S>, markups: I) -> HashSet<MediaId>
where
    S: KeyValueStore,
    I: IntoIterator<Item = &'a str>,
{
    markups
        .into_iter()
        .flat_map(|markup| extract_with_store(markup, blobs))
        .collect()
}

/// Delete every stored record none of `markups` references. Returns the
/// deleted ids.
pub fn cleanup_orphans<'a, S, I>(blobs: &BlobStore<S>, markups: I) -> Result<Vec<MediaId>, StoreError>
where
    S: KeyValueStore,
    I: IntoIterator<Item = &'a str>,
{
    let referenced = referenced_ids(blobs, markups);
    blobs.retain(&referenced)
}

#[cfg(test)]
mod tests {
    use quill_common::{MediaPayload, MediaRecord, MemoryStore};

    use super::*;

    #[test]
    fn unreferenced_records_are_removed() {
        let blobs = BlobStore::new(MemoryStore::new());
        for id in ["A", "B", "C"] {
            blobs
                .put(&MediaRecord::new(
                    MediaId::new(id),
                    MediaPayload::Html {
                        html_content: id.into(),
                    },
                ))
                .unwrap();
        }
        let doc = r#"<p>keep</p><div data-raw-html="true" data-media-id="A">A</div>"#;
        let removed = cleanup_orphans(&blobs, [doc]).unwrap();
        assert_eq!(removed, vec![MediaId::new("B"), MediaId::new("C")]);
        assert_eq!(blobs.list_ids().unwrap(), vec![MediaId::new("A")]);
    }

    #[test]
    fn references_from_any_document_count() {
        let blobs = BlobStore::new(MemoryStore::new());
        for id in ["A", "B"] {
            blobs
                .put(&MediaRecord::new(
                    MediaId::new(id),
                    MediaPayload::Html {
                        html_content: id.into(),
                    },
                ))
                .unwrap();
        }
        let docs = [
            r#"<div data-media-type="html" data-media-id="A"></div>"#,
            r#"<div data-media-type="html" data-media-id="B"></div>"#,
        ];
        assert!(cleanup_orphans(&blobs, docs).unwrap().is_empty());
        assert_eq!(blobs.list_ids().unwrap().len(), 2);
    }
}
