//! End-to-end flows through the session, repository and blob store.

use std::time::Duration;

use quill_common::{MediaPayload, MemoryStore};
use quill_editor_core::{
    AutosaveOutcome, BlobStore, EditingSurface, EditorConfig, EditorSession, InsertRequest,
    MarkupBuffer, MediaId, MediaRecord, PostRepository, PostRoute, RehydrateWarning,
    cleanup_orphans, extract, rehydrate,
};
use web_time::Instant;

fn session() -> EditorSession<MarkupBuffer> {
    EditorSession::new(EditorConfig::default(), MarkupBuffer::default())
}

fn html_record(id: &str) -> MediaRecord {
    MediaRecord::new(
        MediaId::new(id),
        MediaPayload::Html {
            html_content: format!("<em>{id}</em>"),
        },
    )
}

#[test]
fn youtube_insert_save_and_reload_without_record() {
    let kv = MemoryStore::new();
    let mut repo = PostRepository::load(&kv).unwrap();
    let blobs = BlobStore::new(&kv);

    let mut editor = session();
    editor.open(PostRoute::New, &repo, &blobs).unwrap();
    editor.set_title("Video", Instant::now()).unwrap();
    let inserted = editor
        .insert(
            InsertRequest::YouTube("https://youtu.be/dQw4w9WgXcQ".into()),
            &blobs,
            Instant::now(),
        )
        .unwrap();
    let id = inserted.media_id.unwrap();
    assert!(inserted.persisted);

    match blobs.get(&id).unwrap().payload {
        MediaPayload::Youtube { video_id, .. } => assert_eq!(video_id, "dQw4w9WgXcQ"),
        other => panic!("unexpected payload {other:?}"),
    }
    assert!(editor.surface().markup().contains("https://www.youtube.com/embed/dQw4w9WgXcQ"));

    editor.publish(&mut repo, &blobs).unwrap();
    let post_id = editor.post_id().unwrap();
    let saved = repo.get(post_id).unwrap().clone();
    assert_eq!(saved.media_ids, vec![id.clone()]);
    assert_eq!(extract(&saved.content), vec![id.clone()]);

    blobs.delete(&id).unwrap();
    let result = rehydrate(&saved.content, &saved.media_ids, &blobs);
    assert_eq!(result.markup, saved.content);
    assert_eq!(result.warnings, vec![RehydrateWarning::MissingRecord(id)]);

    let mut reloaded = session();
    reloaded
        .open(PostRoute::Existing(post_id), &repo, &blobs)
        .unwrap();
    assert_eq!(reloaded.surface().markup(), saved.content);
}

#[test]
fn orphan_cleanup_keeps_only_referenced_records() {
    let blobs = BlobStore::new(MemoryStore::new());
    for id in ["A", "B", "C"] {
        blobs.put(&html_record(id)).unwrap();
    }
    let markup = r#"<p>intro</p><div data-raw-html="true" data-media-type="html" data-media-id="A"><em>A</em></div>"#;

    let removed = cleanup_orphans(&blobs, [markup]).unwrap();
    assert_eq!(removed, vec![MediaId::new("B"), MediaId::new("C")]);
    assert_eq!(blobs.list_ids().unwrap(), vec![MediaId::new("A")]);
    assert!(blobs.verify_index().unwrap().is_consistent());
}

#[test]
fn rehydration_restores_once() {
    let blobs = BlobStore::new(MemoryStore::new());
    blobs.put(&html_record("html_1_1")).unwrap();
    let ids = [MediaId::new("html_1_1")];

    let once = rehydrate("<p>body</p>", &ids, &blobs);
    assert!(once.warnings.is_empty());
    assert_eq!(extract(&once.markup), ids.to_vec());

    let twice = rehydrate(&once.markup, &ids, &blobs);
    assert_eq!(twice.markup, once.markup);
    assert_eq!(twice.markup.matches("data-media-id=\"html_1_1\"").count(), 1);
}

#[test]
fn unknown_ids_leave_markup_untouched() {
    let blobs = BlobStore::new(MemoryStore::new());
    let markup = "<p>Nothing  <b>here</b></p>";
    let result = rehydrate(markup, &[MediaId::new("youtube_0_0")], &blobs);
    assert_eq!(result.markup, markup);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn autosave_gates_on_content_for_new_posts() {
    let kv = MemoryStore::new();
    let mut repo = PostRepository::load(&kv).unwrap();
    let blobs = BlobStore::new(&kv);
    let mut editor = session();
    editor.open(PostRoute::New, &repo, &blobs).unwrap();

    let t0 = Instant::now();
    editor.set_title("", t0).unwrap();
    assert_eq!(
        editor
            .tick(t0 + Duration::from_secs(1), &mut repo, &blobs)
            .unwrap(),
        AutosaveOutcome::Skipped
    );
    assert!(repo.is_empty());

    editor.set_title("Draft one", t0 + Duration::from_secs(2)).unwrap();
    assert_eq!(
        editor
            .tick(t0 + Duration::from_millis(2500), &mut repo, &blobs)
            .unwrap(),
        AutosaveOutcome::Idle
    );
    assert_eq!(
        editor
            .tick(t0 + Duration::from_secs(3), &mut repo, &blobs)
            .unwrap(),
        AutosaveOutcome::Saved
    );
    assert_eq!(repo.len(), 1);
    assert_eq!(repo.list()[0].title, "Draft one");
}

#[test]
fn long_body_gets_truncated_excerpt() {
    let kv = MemoryStore::new();
    let mut repo = PostRepository::load(&kv).unwrap();
    let blobs = BlobStore::new(&kv);
    let mut editor = session();
    editor.open(PostRoute::New, &repo, &blobs).unwrap();

    let text: String = "abcdefghij".repeat(30);
    assert_eq!(text.chars().count(), 300);
    editor
        .edit_body(&format!("<p>{text}</p>"), Instant::now())
        .unwrap();
    editor.publish(&mut repo, &blobs).unwrap();

    let excerpt = &repo.list()[0].excerpt;
    assert_eq!(excerpt, &format!("{}...", &text[..160]));
}
