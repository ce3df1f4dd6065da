//! End-to-end sweep tests against the SQLite store
//!
//! Exercises the full pipeline (store -> scheduler -> publisher -> mock
//! platform API) with a real database file, covering the durability
//! guarantees the in-memory unit tests cannot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use libquillcast::credentials::CredentialBroker;
use libquillcast::media::MemoryMediaStore;
use libquillcast::platform::mock::MockApi;
use libquillcast::store::{CredentialStore, ScheduledItemStore};
use libquillcast::{
    Credential, Database, ItemStatus, PublishError, Publisher, ScheduledPost, ScheduledThread,
    Scheduler,
};

const NOW: i64 = 1_700_000_000;

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(NOW, 0).unwrap()
}

async fn setup() -> (TempDir, Database, MockApi, Scheduler) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queue.db");
    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    db.put(&Credential {
        owner_id: "owner-1".to_string(),
        access_token: "token".to_string(),
        refresh_token: Some("refresh".to_string()),
        expires_at: NOW + 3600,
        updated_at: NOW - 100,
    })
    .await
    .unwrap();

    let api = MockApi::new();
    let broker = CredentialBroker::new(Arc::new(db.clone()), Arc::new(api.clone()));
    let publisher = Publisher::new(
        Arc::new(api.clone()),
        Arc::new(MemoryMediaStore::new()),
        broker,
    );
    let scheduler = Scheduler::new(Arc::new(db.clone()), publisher);

    (dir, db, api, scheduler)
}

#[tokio::test]
async fn test_mixed_sweep_reaches_terminal_states() {
    let (_dir, db, api, scheduler) = setup().await;

    let good = ScheduledPost::new("owner-1", "a perfectly fine post", NOW - 120);
    let too_long = ScheduledPost::new("owner-1", &"x".repeat(301), NOW - 60);
    let future = ScheduledPost::new("owner-1", "not due yet", NOW + 600);
    db.create_post(&good).await.unwrap();
    db.create_post(&too_long).await.unwrap();
    db.create_post(&future).await.unwrap();

    let report = scheduler.run_sweep(now()).await.unwrap();
    assert_eq!(report.posts_published, 1);
    assert_eq!(report.posts_failed, 1);

    let good = db.get_post(&good.id).await.unwrap().unwrap();
    assert_eq!(good.status, ItemStatus::Published);
    assert!(good.remote_id.is_some());

    let too_long = db.get_post(&too_long.id).await.unwrap().unwrap();
    assert_eq!(too_long.status, ItemStatus::Failed);
    assert!(too_long.error.unwrap().contains("301"));

    let future = db.get_post(&future.id).await.unwrap().unwrap();
    assert_eq!(future.status, ItemStatus::Scheduled);

    // The oversize post never reached the platform
    assert_eq!(api.create_call_count(), 1);
}

#[tokio::test]
async fn test_thread_partial_failure_is_durable() {
    let (_dir, db, api, scheduler) = setup().await;
    api.fail_posts_containing("break here", PublishError::Remote("503".to_string()));

    let thread = ScheduledThread::new("owner-1", NOW - 60);
    let members = vec![
        ScheduledPost::in_thread("owner-1", "opener", NOW - 60, &thread.id, 0),
        ScheduledPost::in_thread("owner-1", "break here", NOW - 60, &thread.id, 1),
        ScheduledPost::in_thread("owner-1", "closer", NOW - 60, &thread.id, 2),
    ];
    db.create_thread(&thread, &members).await.unwrap();

    let report = scheduler.run_sweep(now()).await.unwrap();
    assert_eq!(report.threads_failed, 1);

    let opener = db.get_post(&members[0].id).await.unwrap().unwrap();
    assert_eq!(opener.status, ItemStatus::Published);
    assert!(opener.remote_id.is_some());

    for member in &members[1..] {
        let stored = db.get_post(&member.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ItemStatus::Scheduled);
        assert_eq!(stored.remote_id, None);
    }

    let stored_thread = db.get_thread(&thread.id).await.unwrap().unwrap();
    assert_eq!(stored_thread.status, ItemStatus::Failed);
    assert!(stored_thread.error.unwrap().contains("member 1"));

    // A follow-up sweep must not touch the remainder
    let calls_after_first = api.create_call_count();
    let report = scheduler.run_sweep(now()).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(api.create_call_count(), calls_after_first);
}

#[tokio::test]
async fn test_sweep_commits_progress_item_by_item() {
    let (_dir, db, api, scheduler) = setup().await;
    api.fail_posts_containing("late failure", PublishError::Network("timed out".to_string()));

    let first = ScheduledPost::new("owner-1", "early success", NOW - 180);
    let second = ScheduledPost::new("owner-1", "late failure", NOW - 60);
    db.create_post(&first).await.unwrap();
    db.create_post(&second).await.unwrap();

    scheduler.run_sweep(now()).await.unwrap();

    // Both terminal transitions were written despite the second failing
    let first = db.get_post(&first.id).await.unwrap().unwrap();
    let second = db.get_post(&second.id).await.unwrap().unwrap();
    assert_eq!(first.status, ItemStatus::Published);
    assert_eq!(second.status, ItemStatus::Failed);
    assert!(second.error.unwrap().contains("timed out"));

    // A second snapshot sees no remaining work
    let due = db.get_due(NOW).await.unwrap();
    assert!(due.posts.is_empty());
    assert!(due.threads.is_empty());
}
