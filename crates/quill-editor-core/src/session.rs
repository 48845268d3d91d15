//! Editor session: one open post, its editing surface and autosave.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> Saving -> Ready
//! ```
//!
//! A session is opened once per route. Opening the route that is already
//! open and ready does nothing, so the body is never rehydrated twice.
//! Autosave is driven by the host calling [`EditorSession::tick`] with the
//! current time; publishing saves immediately.

use chrono::{DateTime, Utc};
use quill_common::{
    BlobStore, EditorConfig, KeyValueStore, MediaId, MediaKind, MediaRecord, QuillError,
    ValidationError,
};
use web_time::Instant;

use crate::autosave::AutosaveScheduler;
use crate::extract::extract_with_store;
use crate::insert::{ImageUpload, InsertRequest, Insertion, insert_media};
use crate::metadata::{LinkMetadata, parse_link};
use crate::post::{Post, PostId, PostStatus, make_excerpt};
use crate::rehydrate::{rehydrate, resolve_cover_image};
use crate::repository::PostRepository;
use crate::surface::EditingSurface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Content is being loaded into the surface.
    Initializing,
    /// Autosave is active.
    Ready,
    Saving,
}

/// Which post the editor is pointed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostRoute {
    New,
    Existing(PostId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// The route was already open and ready. Nothing was reloaded.
    AlreadyOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutosaveOutcome {
    /// Nothing due yet.
    Idle,
    /// A save was due but the post had nothing worth keeping.
    Skipped,
    Saved,
}

/// An in-flight bookmark lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookmarkRequest {
    pub token: u64,
    pub url: String,
}

pub struct EditorSession<E> {
    config: EditorConfig,
    surface: E,
    state: SessionState,
    route: Option<PostRoute>,
    /// Last loaded or saved version of the post. Title and body live in
    /// `title` and the surface until the next save.
    post: Option<Post>,
    title: String,
    scheduler: AutosaveScheduler,
    bookmark_token: u64,
    last_saved: Option<DateTime<Utc>>,
}

impl<E: EditingSurface> EditorSession<E> {
    pub fn new(config: EditorConfig, surface: E) -> Self {
        let scheduler = AutosaveScheduler::new(&config.autosave);
        Self {
            config,
            surface,
            state: SessionState::Uninitialized,
            route: None,
            post: None,
            title: String::new(),
            scheduler,
            bookmark_token: 0,
            last_saved: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn route(&self) -> Option<PostRoute> {
        self.route
    }

    pub fn post(&self) -> Option<&Post> {
        self.post.as_ref()
    }

    pub fn post_id(&self) -> Option<PostId> {
        self.post.as_ref().map(|p| p.id)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn surface(&self) -> &E {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut E {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &AutosaveScheduler {
        &self.scheduler
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Load the post behind `route` into the surface.
    #[tracing::instrument(skip_all, fields(route = ?route))]
    pub fn open<S, B>(
        &mut self,
        route: PostRoute,
        repo: &PostRepository<S>,
        blobs: &BlobStore<B>,
    ) -> Result<OpenOutcome, QuillError>
    where
        S: KeyValueStore,
        B: KeyValueStore,
    {
        if self.state == SessionState::Ready && self.route == Some(route) {
            tracing::trace!("route already open");
            return Ok(OpenOutcome::AlreadyOpen);
        }

        let previous = self.state;
        self.state = SessionState::Initializing;
        let (post, markup) = match route {
            PostRoute::New => (Post::new_draft(Utc::now()), String::new()),
            PostRoute::Existing(id) => {
                let Some(post) = repo.get(id) else {
                    self.state = previous;
                    return Err(QuillError::PostNotFound(id.0));
                };
                let rehydrated = rehydrate(&post.content, &post.media_ids, blobs);
                for warning in &rehydrated.warnings {
                    tracing::warn!(post_id = %id, %warning, "rehydration");
                }
                (post.clone(), rehydrated.markup)
            }
        };

        self.surface.set_markup(&markup);
        self.title = post.title.clone();
        tracing::debug!(post_id = %post.id, "opened post");
        self.post = Some(post);
        self.route = Some(route);
        self.scheduler.cancel();
        // Lookups started for the previous post must not land in this one.
        self.bookmark_token += 1;
        self.last_saved = None;
        self.state = SessionState::Ready;
        Ok(OpenOutcome::Opened)
    }

    /// Leave the current post. Pending autosaves are dropped.
    pub fn close(&mut self) {
        self.scheduler.cancel();
        self.bookmark_token += 1;
        self.post = None;
        self.route = None;
        self.title.clear();
        self.surface.set_markup("");
        self.state = SessionState::Uninitialized;
    }

    fn require_open(&self) -> Result<(), QuillError> {
        match self.post {
            Some(_) => Ok(()),
            None => Err(QuillError::InvalidState("no post is open".into())),
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>, now: Instant) -> Result<(), QuillError> {
        self.require_open()?;
        self.title = title.into();
        self.scheduler.note_edit(now);
        Ok(())
    }

    /// Replace the body, as the surface reports after a user edit.
    pub fn edit_body(&mut self, markup: &str, now: Instant) -> Result<(), QuillError> {
        self.require_open()?;
        self.surface.set_markup(markup);
        self.scheduler.note_edit(now);
        Ok(())
    }

    /// Insert media at the cursor.
    pub fn insert<B: KeyValueStore>(
        &mut self,
        request: InsertRequest,
        blobs: &BlobStore<B>,
        now: Instant,
    ) -> Result<Insertion, QuillError> {
        self.require_open()?;
        let insertion = insert_media(request, blobs)?;
        self.surface.insert_fragment(&insertion.fragment);
        self.scheduler.note_edit(now);
        Ok(insertion)
    }

    /// Whether the title or the body has visible text.
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.surface.plain_text().trim().is_empty()
    }

    /// Run a due autosave. New posts are only saved once they have content;
    /// posts already in the repository are saved whatever they contain.
    pub fn tick<S, B>(
        &mut self,
        now: Instant,
        repo: &mut PostRepository<S>,
        blobs: &BlobStore<B>,
    ) -> Result<AutosaveOutcome, QuillError>
    where
        S: KeyValueStore,
        B: KeyValueStore,
    {
        if self.state != SessionState::Ready {
            return Ok(AutosaveOutcome::Idle);
        }
        let Some(id) = self.post_id() else {
            return Ok(AutosaveOutcome::Idle);
        };
        if !self.scheduler.poll(now) {
            return Ok(AutosaveOutcome::Idle);
        }
        if !repo.contains(id) && !self.has_content() {
            tracing::debug!(post_id = %id, "new post is still empty, not saving");
            return Ok(AutosaveOutcome::Skipped);
        }
        self.save(repo, blobs, None)?;
        Ok(AutosaveOutcome::Saved)
    }

    /// Save now as published. Reads the live title and body, ignores the
    /// autosave windows and drops any pending autosave.
    pub fn publish<S, B>(
        &mut self,
        repo: &mut PostRepository<S>,
        blobs: &BlobStore<B>,
    ) -> Result<(), QuillError>
    where
        S: KeyValueStore,
        B: KeyValueStore,
    {
        self.require_open()?;
        self.scheduler.cancel();
        self.save(repo, blobs, Some(PostStatus::Published))?;
        tracing::info!(post_id = ?self.post_id(), "published post");
        Ok(())
    }

    /// The post as it would be saved right now.
    pub fn snapshot<B: KeyValueStore>(&self, blobs: &BlobStore<B>) -> Option<Post> {
        let mut post = self.post.clone()?;
        post.content = self.surface.markup();
        post.title = if self.title.trim().is_empty() {
            self.config.untitled_title.clone()
        } else {
            self.title.clone()
        };
        post.excerpt = make_excerpt(self.surface.plain_text().trim(), self.config.excerpt_length);
        post.media_ids = extract_with_store(&post.content, blobs);
        Some(post)
    }

    fn save<S, B>(
        &mut self,
        repo: &mut PostRepository<S>,
        blobs: &BlobStore<B>,
        status: Option<PostStatus>,
    ) -> Result<(), QuillError>
    where
        S: KeyValueStore,
        B: KeyValueStore,
    {
        let Some(mut post) = self.snapshot(blobs) else {
            return Err(QuillError::InvalidState("no post is open".into()));
        };
        if let Some(status) = status {
            post.status = status;
        }
        let id = post.id;

        let resume = self.state;
        self.state = SessionState::Saving;
        let result = repo.upsert(post);
        self.state = resume;

        let created = result?;
        self.post = repo.get(id).cloned();
        self.last_saved = Some(Utc::now());
        tracing::debug!(post_id = %id, created, "saved post");
        Ok(())
    }

    /// Store `upload` as the cover image. The previous cover record is left
    /// for garbage collection.
    pub fn set_cover_image<B: KeyValueStore>(
        &mut self,
        upload: ImageUpload,
        blobs: &BlobStore<B>,
        now: Instant,
    ) -> Result<MediaId, QuillError> {
        self.require_open()?;
        let record = MediaRecord::new(MediaId::generate(MediaKind::Image), upload.to_payload());
        blobs.put(&record)?;
        if let Some(post) = self.post.as_mut() {
            post.cover_image_id = Some(record.id.clone());
        }
        self.scheduler.note_edit(now);
        Ok(record.id)
    }

    /// Use an image already in the blob store as the cover.
    pub fn use_cover_image<B: KeyValueStore>(
        &mut self,
        id: MediaId,
        blobs: &BlobStore<B>,
        now: Instant,
    ) -> Result<(), QuillError> {
        self.require_open()?;
        let Some(record) = blobs.get(&id) else {
            return Err(QuillError::MediaNotFound(id));
        };
        if record.kind() != MediaKind::Image {
            return Err(ValidationError::NotAnImage(id.to_string()).into());
        }
        if let Some(post) = self.post.as_mut() {
            post.cover_image_id = Some(id);
        }
        self.scheduler.note_edit(now);
        Ok(())
    }

    pub fn clear_cover_image(&mut self, now: Instant) -> Result<(), QuillError> {
        self.require_open()?;
        if let Some(post) = self.post.as_mut() {
            post.cover_image_id = None;
        }
        self.scheduler.note_edit(now);
        Ok(())
    }

    /// Data URL of the cover image, if set and stored.
    pub fn cover_image<B: KeyValueStore>(&self, blobs: &BlobStore<B>) -> Option<String> {
        resolve_cover_image(self.post.as_ref()?, blobs)
    }

    /// Start a bookmark lookup for `url`. Any earlier lookup still in flight
    /// becomes stale.
    pub fn begin_bookmark(&mut self, url: &str) -> Result<BookmarkRequest, QuillError> {
        self.require_open()?;
        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::Empty("URL").into());
        }
        parse_link(url)?;
        self.bookmark_token += 1;
        Ok(BookmarkRequest {
            token: self.bookmark_token,
            url: url.to_owned(),
        })
    }

    /// Insert the card for a finished lookup. Returns `None` when the
    /// request is stale and was dropped.
    pub fn complete_bookmark<B: KeyValueStore>(
        &mut self,
        request: &BookmarkRequest,
        metadata: LinkMetadata,
        blobs: &BlobStore<B>,
        now: Instant,
    ) -> Result<Option<Insertion>, QuillError> {
        if request.token != self.bookmark_token {
            tracing::debug!(
                url = %request.url,
                token = request.token,
                current = self.bookmark_token,
                "dropping stale bookmark lookup"
            );
            return Ok(None);
        }
        let insertion = self.insert(InsertRequest::Bookmark(metadata), blobs, now)?;
        Ok(Some(insertion))
    }
}
