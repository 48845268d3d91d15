//! Out-of-band storage for media payloads.
//!
//! ## Storage layout
//!
//! - `blob-<mediaId>`: JSON-encoded [`MediaRecord`]
//! - `blob-index`: JSON array of every live [`MediaId`], in insertion order
//!
//! The index should always match the set of stored records. Mismatches are
//! tolerated: they are logged and can be reported with
//! [`BlobStore::verify_index`] or fixed with [`BlobStore::repair_index`].

use std::collections::HashSet;

use crate::config::StorageKeys;
use crate::error::StoreError;
use crate::kv::{KeyValueStore, KeyValueStoreExt};
use crate::media::{MediaId, MediaRecord};

/// Index inconsistencies found by [`BlobStore::verify_index`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    /// Ids listed in the index with no stored record.
    pub dangling: Vec<MediaId>,
    /// Stored records whose id is missing from the index.
    pub unindexed: Vec<MediaId>,
}

impl IndexReport {
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty() && self.unindexed.is_empty()
    }
}

pub struct BlobStore<S> {
    kv: S,
    keys: StorageKeys,
}

impl<S: KeyValueStore> BlobStore<S> {
    pub fn new(kv: S) -> Self {
        Self::with_keys(kv, StorageKeys::default())
    }

    pub fn with_keys(kv: S, keys: StorageKeys) -> Self {
        Self { kv, keys }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    /// Key of the record for `id`. Ids that would land on the index key are
    /// refused.
    fn record_key(&self, id: &MediaId) -> Result<String, StoreError> {
        let key = format!("{}{}", self.keys.blob_prefix, id);
        if key == self.keys.blob_index_key {
            return Err(StoreError::ReservedKey { key });
        }
        Ok(key)
    }

    /// Store a record under its id and add the id to the index.
    ///
    /// Writing an id that already exists replaces the record and leaves the
    /// index untouched.
    pub fn put(&self, record: &MediaRecord) -> Result<(), StoreError> {
        let key = self.record_key(&record.id)?;
        self.kv.put_json(&key, record)?;

        let mut index = self.list_ids()?;
        if !index.contains(&record.id) {
            index.push(record.id.clone());
            if let Err(e) = self.write_index(&index) {
                // keep record and index consistent: undo the record write
                if let Err(undo) = self.kv.delete(&key) {
                    tracing::warn!(media_id = %record.id, error = %undo, "failed to roll back blob write");
                }
                return Err(e);
            }
        }
        tracing::debug!(media_id = %record.id, kind = %record.kind(), "stored media record");
        Ok(())
    }

    /// Look up a record. Missing and unreadable records both come back as `None`.
    pub fn get(&self, id: &MediaId) -> Option<MediaRecord> {
        let key = match self.record_key(id) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(media_id = %id, error = %e, "media id cannot name a record");
                return None;
            }
        };
        match self.kv.get_json::<MediaRecord>(&key) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(media_id = %id, error = %e, "unreadable media record");
                None
            }
        }
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        match self.record_key(id) {
            Ok(key) => matches!(self.kv.get(&key), Ok(Some(_))),
            Err(_) => false,
        }
    }

    /// Remove a record and its index entry. Returns whether a record existed.
    pub fn delete(&self, id: &MediaId) -> Result<bool, StoreError> {
        let Ok(key) = self.record_key(id) else {
            return Ok(false);
        };
        let existed = self.kv.delete(&key)?;
        let mut index = self.list_ids()?;
        let before = index.len();
        index.retain(|i| i != id);
        if index.len() != before {
            self.write_index(&index)?;
        } else if existed {
            tracing::warn!(media_id = %id, "deleted media record that was not indexed");
        }
        tracing::debug!(media_id = %id, existed, "deleted media record");
        Ok(existed)
    }

    /// Every id in the index, in insertion order.
    ///
    /// An unreadable index is treated as empty so enumeration never blocks
    /// loading; the next write replaces it.
    pub fn list_ids(&self) -> Result<Vec<MediaId>, StoreError> {
        match self.kv.get_json::<Vec<MediaId>>(&self.keys.blob_index_key) {
            Ok(index) => Ok(index.unwrap_or_default()),
            Err(StoreError::Serialization { key, source }) => {
                tracing::warn!(%key, error = %source, "blob index is corrupt, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Every record reachable from the index. Dangling ids are skipped.
    pub fn records(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let ids = self.list_ids()?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let record = self.get(id);
                if record.is_none() {
                    tracing::warn!(media_id = %id, "indexed media id has no record");
                }
                record
            })
            .collect())
    }

    /// Compare the index against the records actually stored.
    pub fn verify_index(&self) -> Result<IndexReport, StoreError> {
        let index = self.list_ids()?;
        let stored = self.stored_ids()?;
        let stored_set: HashSet<&MediaId> = stored.iter().collect();
        let index_set: HashSet<&MediaId> = index.iter().collect();

        let report = IndexReport {
            dangling: index
                .iter()
                .filter(|id| !stored_set.contains(id))
                .cloned()
                .collect(),
            unindexed: stored
                .iter()
                .filter(|id| !index_set.contains(id))
                .cloned()
                .collect(),
        };
        for id in &report.dangling {
            tracing::warn!(media_id = %id, "blob index lists a missing record");
        }
        for id in &report.unindexed {
            tracing::warn!(media_id = %id, "stored media record is missing from the blob index");
        }
        Ok(report)
    }

    /// Rewrite the index to exactly the set of stored records.
    pub fn repair_index(&self) -> Result<IndexReport, StoreError> {
        let report = self.verify_index()?;
        if report.is_consistent() {
            return Ok(report);
        }
        let mut index = self.list_ids()?;
        index.retain(|id| !report.dangling.contains(id));
        index.extend(report.unindexed.iter().cloned());
        self.write_index(&index)?;
        tracing::info!(
            dropped = report.dangling.len(),
            added = report.unindexed.len(),
            "repaired blob index"
        );
        Ok(report)
    }

    /// Delete every indexed record not in `referenced`. Returns the deleted ids.
    pub fn retain(&self, referenced: &HashSet<MediaId>) -> Result<Vec<MediaId>, StoreError> {
        let mut removed = Vec::new();
        for id in self.list_ids()? {
            if !referenced.contains(&id) {
                self.delete(&id)?;
                removed.push(id);
            }
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "removed orphaned media records");
        }
        Ok(removed)
    }

    fn stored_ids(&self) -> Result<Vec<MediaId>, StoreError> {
        Ok(self
            .kv
            .list_keys()?
            .into_iter()
            .filter(|k| *k != self.keys.blob_index_key)
            .filter_map(|k| {
                k.strip_prefix(self.keys.blob_prefix.as_str())
                    .map(MediaId::from)
            })
            .collect())
    }

    fn write_index(&self, index: &[MediaId]) -> Result<(), StoreError> {
        self.kv.put_json(&self.keys.blob_index_key, index)
    }
}
