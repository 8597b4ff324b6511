//! Corpus embedding pipeline: skip/force, bounded concurrency, settle-all
//! failure handling, per-edit refresh, and catch-up.

mod helpers;

use std::sync::Arc;

use brain::index::pipeline::{EmbedProjectOptions, EmbeddingPipeline};
use brain::index::store;
use brain::notes::FsNoteStore;
use helpers::{shared_test_db, test_config, write_note, MockBackend};
use tempfile::TempDir;

fn fixture_notes(count: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..count {
        write_note(
            dir.path(),
            &format!("note-{i}.md"),
            &format!("note {i} talks about topic {i}"),
        );
    }
    dir
}

fn build_pipeline(
    notes_dir: &TempDir,
    backend: Arc<MockBackend>,
    concurrency: usize,
) -> (EmbeddingPipeline, Arc<std::sync::Mutex<rusqlite::Connection>>) {
    let db = shared_test_db();
    let mut config = test_config();
    config.embedding.concurrency = concurrency;
    let notes = Arc::new(FsNoteStore::new(notes_dir.path()));
    let pipeline = EmbeddingPipeline::new(
        Arc::clone(&db),
        backend,
        notes,
        Arc::new(config),
    );
    (pipeline, db)
}

#[tokio::test]
async fn embed_project_processes_all_notes() {
    let dir = fixture_notes(5);
    let backend = Arc::new(MockBackend::new());
    let (pipeline, db) = build_pipeline(&dir, Arc::clone(&backend), 4);

    let report = pipeline.embed_project(EmbedProjectOptions::default()).await;

    assert_eq!(report.processed, 5);
    assert_eq!(report.failed, 0);
    assert!(report.total_chunks >= 5);

    let conn = db.lock().unwrap();
    assert_eq!(store::count_entities(&conn).unwrap(), 5);
}

#[tokio::test]
async fn embed_project_skips_already_embedded_unless_forced() {
    let dir = fixture_notes(3);
    let backend = Arc::new(MockBackend::new());
    let (pipeline, _db) = build_pipeline(&dir, Arc::clone(&backend), 4);

    let first = pipeline.embed_project(EmbedProjectOptions::default()).await;
    assert_eq!(first.processed, 3);
    let calls_after_first = backend.call_count();

    // Second run without force: everything is already embedded.
    let second = pipeline.embed_project(EmbedProjectOptions::default()).await;
    assert_eq!(second.processed, 0);
    assert_eq!(backend.call_count(), calls_after_first);

    // Forced run re-embeds all three.
    let forced = pipeline
        .embed_project(EmbedProjectOptions {
            force: true,
            limit: 0,
        })
        .await;
    assert_eq!(forced.processed, 3);
}

#[tokio::test]
async fn embed_project_respects_limit() {
    let dir = fixture_notes(6);
    let backend = Arc::new(MockBackend::new());
    let (pipeline, db) = build_pipeline(&dir, backend, 4);

    let report = pipeline
        .embed_project(EmbedProjectOptions {
            force: false,
            limit: 2,
        })
        .await;

    assert_eq!(report.processed, 2);
    let conn = db.lock().unwrap();
    assert_eq!(store::count_entities(&conn).unwrap(), 2);
}

#[tokio::test]
async fn embed_project_never_exceeds_concurrency_cap() {
    let dir = fixture_notes(10);
    let backend = Arc::new(MockBackend::with_delay(25));
    let (pipeline, _db) = build_pipeline(&dir, Arc::clone(&backend), 2);

    let report = pipeline.embed_project(EmbedProjectOptions::default()).await;

    assert_eq!(report.processed, 10);
    assert!(
        backend.peak_concurrency() <= 2,
        "peak concurrency {} exceeded cap",
        backend.peak_concurrency()
    );
}

#[tokio::test]
async fn one_failing_note_never_halts_the_rest() {
    let dir = fixture_notes(4);
    let backend = Arc::new(MockBackend::new());
    backend.fail_text("note 2");
    let (pipeline, db) = build_pipeline(&dir, Arc::clone(&backend), 4);

    let report = pipeline.embed_project(EmbedProjectOptions::default()).await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(
        report.errors[0].contains("note-2"),
        "error should name the failing note: {}",
        report.errors[0]
    );

    let conn = db.lock().unwrap();
    assert_eq!(store::count_entities(&conn).unwrap(), 3);
    assert_eq!(store::count_rows_for_entity(&conn, "note-2").unwrap(), 0);
}

#[tokio::test]
async fn failed_re_embed_leaves_previous_rows_intact() {
    let dir = fixture_notes(1);
    let backend = Arc::new(MockBackend::new());
    let (pipeline, db) = build_pipeline(&dir, Arc::clone(&backend), 4);

    pipeline.embed_note("note-0", "original body").await.unwrap();
    let before = {
        let conn = db.lock().unwrap();
        store::count_rows_for_entity(&conn, "note-0").unwrap()
    };
    assert!(before > 0);

    backend.fail_all();
    let result = pipeline.embed_note("note-0", "updated body").await;
    assert!(result.is_err());

    let conn = db.lock().unwrap();
    assert_eq!(
        store::count_rows_for_entity(&conn, "note-0").unwrap(),
        before
    );
}

#[tokio::test]
async fn refresh_converges_to_latest_content() {
    let dir = fixture_notes(0);
    let backend = Arc::new(MockBackend::with_delay(20));
    let (pipeline, db) = build_pipeline(&dir, backend, 4);

    // Two rapid triggers; the second supersedes the first mid-flight.
    pipeline.trigger_refresh("scratch", "first draft".to_string());
    pipeline.trigger_refresh("scratch", "final draft".to_string());

    // Wait for the refresh chain to drain.
    let mut text = String::new();
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let conn = db.lock().unwrap();
        if store::count_rows_for_entity(&conn, "scratch").unwrap() > 0 {
            text = conn
                .query_row(
                    "SELECT chunk_text FROM note_chunks WHERE entity_id = 'scratch' AND chunk_index = 0",
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            if text == "final draft" {
                break;
            }
        }
    }
    assert_eq!(text, "final draft");
}

#[tokio::test]
async fn catch_up_embeds_only_missing_notes() {
    let dir = fixture_notes(4);
    let backend = Arc::new(MockBackend::new());
    let (pipeline, db) = build_pipeline(&dir, Arc::clone(&backend), 4);

    // Pre-embed two of the four.
    pipeline
        .embed_project(EmbedProjectOptions {
            force: false,
            limit: 2,
        })
        .await;

    let report = pipeline.catch_up().await.expect("gate was free");
    assert_eq!(report.processed, 2);

    let conn = db.lock().unwrap();
    assert_eq!(store::count_entities(&conn).unwrap(), 4);
}

#[tokio::test]
async fn catch_up_is_a_no_op_when_index_is_complete() {
    let dir = fixture_notes(2);
    let backend = Arc::new(MockBackend::new());
    let (pipeline, _db) = build_pipeline(&dir, Arc::clone(&backend), 4);

    pipeline.embed_project(EmbedProjectOptions::default()).await;
    let calls = backend.call_count();

    assert!(pipeline.catch_up().await.is_none());
    assert_eq!(backend.call_count(), calls);
}
