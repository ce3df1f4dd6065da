//! In-memory store implementation for testing
//!
//! Backs the scheduler and credential broker with plain hash maps so tests
//! can run without a database file. Seeding and inspection helpers are
//! inherent methods; the production code only sees the store traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::store::{CredentialStore, DueItems, ScheduledItemStore};
use crate::types::{Credential, ItemStatus, ScheduledPost, ScheduledThread};

#[derive(Default)]
struct Inner {
    posts: HashMap<String, ScheduledPost>,
    threads: HashMap<String, ScheduledThread>,
    credentials: HashMap<String, Credential>,
}

/// Hash-map backed stand-in for the SQLite store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_post(&self, post: ScheduledPost) {
        self.inner.lock().unwrap().posts.insert(post.id.clone(), post);
    }

    pub fn insert_thread(&self, thread: ScheduledThread, members: Vec<ScheduledPost>) {
        let mut inner = self.inner.lock().unwrap();
        let mut thread = thread;
        thread.member_post_ids = members.iter().map(|m| m.id.clone()).collect();
        inner.threads.insert(thread.id.clone(), thread);
        for member in members {
            inner.posts.insert(member.id.clone(), member);
        }
    }

    pub fn insert_credential(&self, credential: Credential) {
        self.inner
            .lock()
            .unwrap()
            .credentials
            .insert(credential.owner_id.clone(), credential);
    }

    pub fn post(&self, id: &str) -> Option<ScheduledPost> {
        self.inner.lock().unwrap().posts.get(id).cloned()
    }

    pub fn thread(&self, id: &str) -> Option<ScheduledThread> {
        self.inner.lock().unwrap().threads.get(id).cloned()
    }

    pub fn credential(&self, owner_id: &str) -> Option<Credential> {
        self.inner.lock().unwrap().credentials.get(owner_id).cloned()
    }

    pub fn post_status(&self, id: &str) -> Option<ItemStatus> {
        self.post(id).map(|p| p.status)
    }

    pub fn thread_status(&self, id: &str) -> Option<ItemStatus> {
        self.thread(id).map(|t| t.status)
    }
}

#[async_trait]
impl ScheduledItemStore for MemoryStore {
    async fn get_due(&self, now: i64) -> Result<DueItems> {
        let inner = self.inner.lock().unwrap();

        let mut posts: Vec<ScheduledPost> = inner
            .posts
            .values()
            .filter(|p| p.status == ItemStatus::Scheduled && p.due_at <= now)
            .cloned()
            .collect();
        posts.sort_by_key(|p| p.due_at);

        let mut threads: Vec<ScheduledThread> = inner
            .threads
            .values()
            .filter(|t| t.status == ItemStatus::Scheduled && t.due_at <= now)
            .cloned()
            .collect();
        threads.sort_by_key(|t| t.due_at);

        Ok(DueItems { posts, threads })
    }

    async fn mark_post_published(&self, id: &str, remote_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(post) = inner.posts.get_mut(id) {
            if post.status == ItemStatus::Scheduled {
                post.status = ItemStatus::Published;
                post.remote_id = Some(remote_id.to_string());
                post.error = None;
            }
        }
        Ok(())
    }

    async fn mark_post_failed(&self, id: &str, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(post) = inner.posts.get_mut(id) {
            if post.status == ItemStatus::Scheduled {
                post.status = ItemStatus::Failed;
                post.error = Some(error.to_string());
            }
        }
        Ok(())
    }

    async fn mark_thread_published(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(thread) = inner.threads.get_mut(id) {
            if thread.status == ItemStatus::Scheduled {
                thread.status = ItemStatus::Published;
                thread.error = None;
            }
        }
        Ok(())
    }

    async fn mark_thread_failed(&self, id: &str, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(thread) = inner.threads.get_mut(id) {
            if thread.status == ItemStatus::Scheduled {
                thread.status = ItemStatus::Failed;
                thread.error = Some(error.to_string());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, owner_id: &str) -> Result<Option<Credential>> {
        Ok(self.inner.lock().unwrap().credentials.get(owner_id).cloned())
    }

    async fn put(&self, credential: &Credential) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .credentials
            .insert(credential.owner_id.clone(), credential.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_due_snapshot_ordering() {
        let store = MemoryStore::new();
        store.insert_post(ScheduledPost::new("owner-1", "second", 2000));
        store.insert_post(ScheduledPost::new("owner-1", "first", 1000));
        store.insert_post(ScheduledPost::new("owner-1", "future", 9000));

        let due = store.get_due(5000).await.unwrap();
        assert_eq!(due.posts.len(), 2);
        assert_eq!(due.posts[0].content, "first");
        assert_eq!(due.posts[1].content, "second");
    }

    #[tokio::test]
    async fn test_mark_transitions_are_terminal() {
        let store = MemoryStore::new();
        let post = ScheduledPost::new("owner-1", "content", 1000);
        let id = post.id.clone();
        store.insert_post(post);

        store.mark_post_failed(&id, "boom").await.unwrap();
        store.mark_post_published(&id, "remote-1").await.unwrap();

        let post = store.post(&id).unwrap();
        assert_eq!(post.status, ItemStatus::Failed);
        assert_eq!(post.error.as_deref(), Some("boom"));
        assert_eq!(post.remote_id, None);
    }

    #[tokio::test]
    async fn test_credential_round_trip() {
        let store = MemoryStore::new();
        let cred = Credential {
            owner_id: "owner-1".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: 1000,
            updated_at: 500,
        };
        store.put(&cred).await.unwrap();

        let fetched = CredentialStore::get(&store, "owner-1").await.unwrap().unwrap();
        assert_eq!(fetched.access_token, "token");
    }
}
