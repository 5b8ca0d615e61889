//! Outbox wiring between the scheduler and the send pipeline.
//!
//! Run with: `cargo test -p ferroas2-server --test scheduler_test`

mod helpers;

use ferroas2_core::models::{WatchStatus, WatchedDir, WatchedFile};
use ferroas2_server::EngineDispatch;
use ferroas2_worker::{DirectoryWatcher, SendDispatch};
use helpers::{setup_test_app, LOCAL, REMOTE};

#[tokio::test]
async fn test_partner_outboxes_are_watched() {
    let app = setup_test_app().await;

    let watched = app.scheduler.watched_directories().await;
    assert_eq!(watched.len(), 1);
    assert_eq!(watched[0].directory, app.config.directories.partner_outbox(REMOTE));
    assert_eq!(watched[0].sender_id, LOCAL);
    assert_eq!(watched[0].receiver_id, REMOTE);
    assert!(watched[0].directory.is_dir());
}

#[tokio::test]
async fn test_dropped_file_is_picked_up() {
    let app = setup_test_app().await;
    let path = app.config.directories.partner_outbox(REMOTE).join("invoice.edi");
    std::fs::write(&path, b"UNB+UNOA:2'").unwrap();

    let mut watcher = DirectoryWatcher::new(app.scheduler.clone());
    assert_eq!(watcher.scan_once().await, 1);

    let file = app.scheduler.watched_file(&path).await.unwrap();
    assert_eq!(file.status, WatchStatus::New);
    assert_eq!(file.receiver_id, REMOTE);
    assert!(app.scheduler.status_report().await.contains("invoice.edi"));
}

#[tokio::test]
async fn test_dispatch_reports_send_failure() {
    let app = setup_test_app().await;
    let dir = WatchedDir::new(app.config.directories.partner_outbox(REMOTE), LOCAL, REMOTE);
    let path = dir.directory.join("unreachable.edi");
    std::fs::write(&path, b"UNB+UNOA:2'").unwrap();

    // acme has no URL configured, so the transmission cannot succeed
    let dispatch = EngineDispatch::new(app.state.services.clone());
    let err = dispatch
        .send_file(&WatchedFile::new(&path, &dir))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("unreachable.edi"));
    assert!(path.exists());
}
