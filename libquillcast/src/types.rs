//! Core types for Quillcast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Character limit the platform enforces per post.
pub const MAX_POST_CHARS: usize = 280;

/// Maximum number of media attachments the platform accepts per post.
pub const MAX_MEDIA_PER_POST: usize = 4;

/// Lifecycle status of a scheduled post or thread.
///
/// Transitions are monotonic: `Scheduled` moves to `Published` or `Failed`
/// and terminal states are never revisited automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Scheduled,
    Published,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Scheduled => "scheduled",
            ItemStatus::Published => "published",
            ItemStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(ItemStatus::Scheduled),
            "published" => Some(ItemStatus::Published),
            "failed" => Some(ItemStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A post waiting in the publication queue.
///
/// Standalone posts have no `thread_id`; thread members carry both the
/// thread back-reference and a 0-based `position` within the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    /// Ordered, opaque references resolved by the media store. At most
    /// [`MAX_MEDIA_PER_POST`] entries.
    pub media_refs: Vec<String>,
    /// Unix timestamp at or after which the post is eligible for publication.
    pub due_at: i64,
    pub thread_id: Option<String>,
    pub position: Option<i64>,
    pub status: ItemStatus,
    /// Last failure message, set only when `status` is `Failed`.
    pub error: Option<String>,
    /// Platform post id, set once published.
    pub remote_id: Option<String>,
    pub created_at: i64,
}

impl ScheduledPost {
    pub fn new(owner_id: &str, content: &str, due_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            media_refs: Vec::new(),
            due_at,
            thread_id: None,
            position: None,
            status: ItemStatus::Scheduled,
            error: None,
            remote_id: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Create a member post of `thread_id` at the given position.
    pub fn in_thread(owner_id: &str, content: &str, due_at: i64, thread_id: &str, position: i64) -> Self {
        let mut post = Self::new(owner_id, content, due_at);
        post.thread_id = Some(thread_id.to_string());
        post.position = Some(position);
        post
    }

    pub fn is_thread_member(&self) -> bool {
        self.thread_id.is_some()
    }
}

/// An ordered sequence of posts published as one reply chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledThread {
    pub id: String,
    pub owner_id: String,
    /// Ordered member post ids. Redundant with the members' `position`
    /// fields; kept for quick membership lookup.
    pub member_post_ids: Vec<String>,
    pub due_at: i64,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub created_at: i64,
}

impl ScheduledThread {
    pub fn new(owner_id: &str, due_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            member_post_ids: Vec::new(),
            due_at,
            status: ItemStatus::Scheduled,
            error: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// OAuth token pair for one owner.
///
/// Created externally when the owner completes the OAuth flow; read and
/// conditionally refreshed by the credential broker before each publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub owner_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is no longer usable.
    pub expires_at: i64,
    pub updated_at: i64,
}

impl Credential {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}
