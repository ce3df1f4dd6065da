//! Sweep scheduling for the publication queue
//!
//! The scheduler materializes the set of due items once per sweep and
//! drives each to a terminal state exactly once. Items within a sweep are
//! processed sequentially so reply chains stay ordered. Every per-item
//! failure is caught at the item boundary; one failing item never blocks
//! the rest of the sweep, and nothing a sweep does can stop the recurring
//! ticker.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::publisher::Publisher;
use crate::store::ScheduledItemStore;
use crate::types::{ScheduledPost, ScheduledThread};

/// Counts of what one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub posts_published: usize,
    pub posts_failed: usize,
    pub threads_published: usize,
    pub threads_failed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

pub struct Scheduler {
    store: Arc<dyn ScheduledItemStore>,
    publisher: Publisher,
}

impl Scheduler {
    pub fn new(store: Arc<dyn ScheduledItemStore>, publisher: Publisher) -> Self {
        Self { store, publisher }
    }

    /// Run one sweep over everything due at `now`.
    ///
    /// # Errors
    ///
    /// Fails only when the due-items snapshot itself cannot be read; the
    /// sweep is skipped and the next tick will retry. Publish and store
    /// failures for individual items are recorded on the items themselves.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let now_ts = now.timestamp();
        let due = self.store.get_due(now_ts).await?;

        if due.is_empty() {
            debug!("sweep found no due items");
            return Ok(SweepReport::default());
        }

        info!(
            posts = due.posts.len(),
            threads = due.threads.len(),
            "sweep found due items"
        );

        let mut report = SweepReport::default();

        // Partition due posts into standalone posts and thread members
        let mut standalone: Vec<ScheduledPost> = Vec::new();
        let mut members_by_thread: HashMap<String, Vec<ScheduledPost>> = HashMap::new();
        for post in due.posts {
            match &post.thread_id {
                Some(thread_id) => members_by_thread
                    .entry(thread_id.clone())
                    .or_default()
                    .push(post),
                None => standalone.push(post),
            }
        }

        for post in &standalone {
            self.sweep_post(post, now_ts, &mut report).await;
        }

        for thread in &due.threads {
            let mut members = members_by_thread.remove(&thread.id).unwrap_or_default();
            members.sort_by_key(|m| m.position.unwrap_or(i64::MAX));
            self.sweep_thread(thread, members, now_ts, &mut report).await;
        }

        // Members whose thread is not due this sweep (typically a thread
        // that already failed) stay scheduled for the operator; they are
        // never republished automatically.
        let orphaned: usize = members_by_thread.values().map(Vec::len).sum();
        if orphaned > 0 {
            debug!(count = orphaned, "left members of non-due threads untouched");
        }

        Ok(report)
    }

    async fn sweep_post(&self, post: &ScheduledPost, now_ts: i64, report: &mut SweepReport) {
        match self.publisher.publish_post(post, now_ts).await {
            Ok(remote_id) => {
                self.record_post_published(&post.id, &remote_id).await;
                report.posts_published += 1;
            }
            Err(cause) => {
                warn!(post_id = %post.id, "publish failed: {}", cause);
                self.record_post_failed(&post.id, &cause.to_string()).await;
                report.posts_failed += 1;
            }
        }
    }

    async fn sweep_thread(
        &self,
        thread: &ScheduledThread,
        members: Vec<ScheduledPost>,
        now_ts: i64,
        report: &mut SweepReport,
    ) {
        if members.is_empty() {
            warn!(thread_id = %thread.id, "due thread has no scheduled member posts");
            self.record_thread_failed(&thread.id, "thread has no scheduled member posts")
                .await;
            report.threads_failed += 1;
            return;
        }

        match self.publisher.publish_thread(&members, now_ts).await {
            Ok(remote_ids) => {
                for (member, remote_id) in members.iter().zip(&remote_ids) {
                    self.record_post_published(&member.id, remote_id).await;
                }
                if let Err(e) = self.store.mark_thread_published(&thread.id).await {
                    error!(thread_id = %thread.id, "failed to record published status: {}", e);
                }
                info!(thread_id = %thread.id, members = members.len(), "thread published");
                report.threads_published += 1;
            }
            Err(chain_error) => {
                // Members posted before the failure exist remotely; record
                // them as published so they are never re-posted. The failing
                // member and everything after it stay scheduled.
                for (member, remote_id) in members.iter().zip(&chain_error.posted) {
                    self.record_post_published(&member.id, remote_id).await;
                }

                let failed_member = &members[chain_error.failed_index];
                let message = format!(
                    "reply chain failed at member {} (post {}): {}",
                    chain_error.failed_index, failed_member.id, chain_error.cause
                );
                warn!(thread_id = %thread.id, "{}", message);
                self.record_thread_failed(&thread.id, &message).await;
                report.threads_failed += 1;
            }
        }
    }

    async fn record_post_published(&self, post_id: &str, remote_id: &str) {
        if let Err(e) = self.store.mark_post_published(post_id, remote_id).await {
            error!(post_id, "failed to record published status: {}", e);
        }
    }

    async fn record_post_failed(&self, post_id: &str, message: &str) {
        if let Err(e) = self.store.mark_post_failed(post_id, message).await {
            error!(post_id, "failed to record failed status: {}", e);
        }
    }

    async fn record_thread_failed(&self, thread_id: &str, message: &str) {
        if let Err(e) = self.store.mark_thread_failed(thread_id, message).await {
            error!(thread_id, "failed to record failed status: {}", e);
        }
    }
}

/// Recurring sweep loop with explicit start/stop.
///
/// Owns the spawned task driving [`Scheduler::run_sweep`] on a fixed
/// interval. Sweep errors are logged and never stop the loop.
pub struct SweepTicker {
    shutdown: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl SweepTicker {
    pub fn start(scheduler: Arc<Scheduler>, poll_interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                if flag.load(Ordering::Relaxed) {
                    info!("shutdown requested, stopping sweep loop");
                    break;
                }

                match scheduler.run_sweep(Utc::now()).await {
                    Ok(report) if !report.is_empty() => {
                        info!(
                            posts_published = report.posts_published,
                            posts_failed = report.posts_failed,
                            threads_published = report.threads_published,
                            threads_failed = report.threads_failed,
                            "sweep completed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("sweep aborted: {}", e),
                }

                // Sleep in one-second slices so shutdown is honored promptly
                let mut remaining = poll_interval.as_secs().max(1);
                while remaining > 0 {
                    if flag.load(Ordering::Relaxed) {
                        break;
                    }
                    sleep(Duration::from_secs(1)).await;
                    remaining -= 1;
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Shared flag, for wiring signal handlers to the loop.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Wait for the loop to exit (something else must set the flag).
    pub async fn join(self) {
        let _ = self.handle.await;
    }

    /// Request shutdown and wait for the loop to exit.
    pub async fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.handle.await;
    }
}
