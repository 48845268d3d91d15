//! Post Repository: every post, persisted as one JSON array.
//!
//! The whole list is rewritten under the posts key after each mutation. The
//! in-memory list only changes once the write succeeded, so a failed save
//! leaves the repository as it was.

use std::collections::HashSet;

use chrono::Utc;
use quill_common::{
    BlobStore, KeyValueStore, KeyValueStoreExt, MediaId, QuillError, StorageKeys, StoreError,
};

use crate::cleanup::referenced_ids;
use crate::post::{Post, PostId};

pub struct PostRepository<S> {
    kv: S,
    key: String,
    /// Newest first.
    posts: Vec<Post>,
}

impl<S: KeyValueStore> PostRepository<S> {
    pub fn load(kv: S) -> Result<Self, StoreError> {
        Self::load_with_keys(kv, &StorageKeys::default())
    }

    /// Read the post index. A corrupt index loads as empty; it is replaced
    /// on the next save.
    pub fn load_with_keys(kv: S, keys: &StorageKeys) -> Result<Self, StoreError> {
        let key = keys.posts_key.clone();
        let posts = match kv.get_json::<Vec<Post>>(&key) {
            Ok(posts) => posts.unwrap_or_default(),
            Err(StoreError::Serialization { key, source }) => {
                tracing::error!(%key, error = %source, "post index is corrupt, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(count = posts.len(), "loaded posts");
        Ok(Self { kv, key, posts })
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    /// All posts, newest first.
    pub fn list(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PostId) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: PostId) -> Option<usize> {
        self.posts.iter().position(|p| p.id == id)
    }

    fn commit(&mut self, posts: Vec<Post>) -> Result<(), StoreError> {
        self.kv.put_json(&self.key, &posts)?;
        self.posts = posts;
        Ok(())
    }

    /// Add a new post at the front. Both timestamps are set to now.
    pub fn insert(&mut self, mut post: Post) -> Result<(), QuillError> {
        if self.contains(post.id) {
            return Err(QuillError::InvalidState(format!(
                "post {} already exists",
                post.id
            )));
        }
        let now = Utc::now();
        post.created_at = now;
        post.updated_at = now;
        let id = post.id;
        let mut posts = Vec::with_capacity(self.posts.len() + 1);
        posts.push(post);
        posts.extend(self.posts.iter().cloned());
        self.commit(posts)?;
        tracing::info!(post_id = %id, "created post");
        Ok(())
    }

    /// Replace an existing post, stamping `updatedAt`.
    pub fn update(&mut self, mut post: Post) -> Result<(), QuillError> {
        let Some(index) = self.position(post.id) else {
            return Err(QuillError::PostNotFound(post.id.0));
        };
        post.updated_at = Utc::now();
        let id = post.id;
        let mut posts = self.posts.clone();
        posts[index] = post;
        self.commit(posts)?;
        tracing::debug!(post_id = %id, "updated post");
        Ok(())
    }

    /// Insert or update. Returns whether the post was new.
    pub fn upsert(&mut self, post: Post) -> Result<bool, QuillError> {
        if self.contains(post.id) {
            self.update(post)?;
            Ok(false)
        } else {
            self.insert(post)?;
            Ok(true)
        }
    }

    /// Returns whether the post existed.
    pub fn delete(&mut self, id: PostId) -> Result<bool, StoreError> {
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        let mut posts = self.posts.clone();
        posts.remove(index);
        self.commit(posts)?;
        tracing::info!(post_id = %id, "deleted post");
        Ok(true)
    }

    /// Delete media records no post uses: not in any body, not listed in
    /// any post's media ids, not a cover image. Returns the deleted ids.
    pub fn collect_garbage<B: KeyValueStore>(
        &self,
        blobs: &BlobStore<B>,
    ) -> Result<Vec<MediaId>, StoreError> {
        let mut keep: HashSet<MediaId> =
            referenced_ids(blobs, self.posts.iter().map(|p| p.content.as_str()));
        for post in &self.posts {
            keep.extend(post.media_ids.iter().cloned());
            keep.extend(post.cover_image_id.iter().cloned());
        }
        blobs.retain(&keep)
    }
}
