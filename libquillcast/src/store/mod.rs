//! Persistent stores consumed by the scheduler and credential broker
//!
//! The scheduler and broker are constructed against these traits rather
//! than a concrete database handle, so tests can substitute the in-memory
//! implementation in [`memory`].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Credential, ScheduledPost, ScheduledThread};

pub mod sqlite;

// The memory store is available for all builds (not just tests) to support
// integration tests.
pub mod memory;

/// Snapshot of everything due at a given instant, ascending by due time.
#[derive(Debug, Clone, Default)]
pub struct DueItems {
    pub posts: Vec<ScheduledPost>,
    pub threads: Vec<ScheduledThread>,
}

impl DueItems {
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.threads.is_empty()
    }
}

/// Query and status-transition surface of the publication queue.
///
/// The scheduler is the only automatic writer of status fields. All `mark_*`
/// operations transition an item out of `scheduled` at most once; calling
/// them on an item already in a terminal state is a no-op.
#[async_trait]
pub trait ScheduledItemStore: Send + Sync {
    /// Snapshot read of due `scheduled` posts and threads (`due_at <= now`).
    /// Items added after the query returns are not part of this sweep.
    async fn get_due(&self, now: i64) -> Result<DueItems>;

    async fn mark_post_published(&self, id: &str, remote_id: &str) -> Result<()>;

    async fn mark_post_failed(&self, id: &str, error: &str) -> Result<()>;

    async fn mark_thread_published(&self, id: &str) -> Result<()>;

    async fn mark_thread_failed(&self, id: &str, error: &str) -> Result<()>;
}

/// Durable mapping from owner id to the owner's current credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, owner_id: &str) -> Result<Option<Credential>>;

    /// Idempotent upsert.
    async fn put(&self, credential: &Credential) -> Result<()>;
}
