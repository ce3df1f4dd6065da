//! SQLite-backed publication queue and credential store

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::store::{CredentialStore, DueItems, ScheduledItemStore};
use crate::types::{Credential, ItemStatus, ScheduledPost, ScheduledThread};

/// Per-status row counts for the operator CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub posts_scheduled: i64,
    pub posts_published: i64,
    pub posts_failed: i64,
    pub threads_scheduled: i64,
    pub threads_published: i64,
    pub threads_failed: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Use forward slashes for the SQLite URL and mode=rwc so the file is
        // created if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Schedule a standalone post
    pub async fn create_post(&self, post: &ScheduledPost) -> Result<()> {
        let media_refs = serde_json::to_string(&post.media_refs).unwrap_or_else(|_| "[]".into());

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, owner_id, content, media_refs, due_at, thread_id, position, status, error, remote_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.owner_id)
        .bind(&post.content)
        .bind(media_refs)
        .bind(post.due_at)
        .bind(&post.thread_id)
        .bind(post.position)
        .bind(post.status.as_str())
        .bind(&post.error)
        .bind(&post.remote_id)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Schedule a thread together with its member posts, atomically.
    pub async fn create_thread(
        &self,
        thread: &ScheduledThread,
        members: &[ScheduledPost],
    ) -> Result<()> {
        let member_ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
        let member_ids_json = serde_json::to_string(&member_ids).unwrap_or_else(|_| "[]".into());

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_threads
                (id, owner_id, member_post_ids, due_at, status, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&thread.id)
        .bind(&thread.owner_id)
        .bind(member_ids_json)
        .bind(thread.due_at)
        .bind(thread.status.as_str())
        .bind(&thread.error)
        .bind(thread.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        for member in members {
            let media_refs =
                serde_json::to_string(&member.media_refs).unwrap_or_else(|_| "[]".into());

            sqlx::query(
                r#"
                INSERT INTO scheduled_posts
                    (id, owner_id, content, media_refs, due_at, thread_id, position, status, error, remote_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&member.id)
            .bind(&member.owner_id)
            .bind(&member.content)
            .bind(media_refs)
            .bind(member.due_at)
            .bind(&member.thread_id)
            .bind(member.position)
            .bind(member.status.as_str())
            .bind(&member.error)
            .bind(&member.remote_id)
            .bind(member.created_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(&format!(
            "{} WHERE id = ?",
            SELECT_POSTS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| post_from_row(&r)))
    }

    /// Get a thread by ID
    pub async fn get_thread(&self, thread_id: &str) -> Result<Option<ScheduledThread>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_THREADS))
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| thread_from_row(&r)))
    }

    /// Member posts of a thread, ascending by position.
    pub async fn thread_members(&self, thread_id: &str) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(&format!(
            "{} WHERE thread_id = ? ORDER BY position ASC",
            SELECT_POSTS
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// List posts, optionally filtered by status, ascending by due time.
    pub async fn list_posts(&self, status: Option<ItemStatus>) -> Result<Vec<ScheduledPost>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "{} WHERE status = ? ORDER BY due_at ASC",
                    SELECT_POSTS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("{} ORDER BY due_at ASC", SELECT_POSTS))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(post_from_row).collect())
    }

    /// List threads, optionally filtered by status, ascending by due time.
    pub async fn list_threads(&self, status: Option<ItemStatus>) -> Result<Vec<ScheduledThread>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "{} WHERE status = ? ORDER BY due_at ASC",
                    SELECT_THREADS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("{} ORDER BY due_at ASC", SELECT_THREADS))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(thread_from_row).collect())
    }

    /// Delete a post that has not yet been attempted. Returns false when the
    /// post is missing or already terminal.
    pub async fn delete_post(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduled_posts WHERE id = ? AND status = 'scheduled'")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a thread and its still-scheduled members. Published threads are
    /// left untouched; a failed thread may be deleted to clean up its
    /// remainder. Returns (thread deleted, members deleted).
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(bool, u64)> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        let members = sqlx::query(
            "DELETE FROM scheduled_posts WHERE thread_id = ? AND status = 'scheduled'",
        )
        .bind(thread_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        let thread = sqlx::query(
            "DELETE FROM scheduled_threads WHERE id = ? AND status IN ('scheduled', 'failed')",
        )
        .bind(thread_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok((thread.rows_affected() > 0, members.rows_affected()))
    }

    /// Move a scheduled post to a new due time. A thread member is detached
    /// from its thread in the process, so it publishes as a standalone post.
    pub async fn reschedule_post(&self, post_id: &str, due_at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET due_at = ?, thread_id = NULL, position = NULL
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(due_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a scheduled thread and its scheduled members to a new due time.
    pub async fn reschedule_thread(&self, thread_id: &str, due_at: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        let thread = sqlx::query(
            "UPDATE scheduled_threads SET due_at = ? WHERE id = ? AND status = 'scheduled'",
        )
        .bind(due_at)
        .bind(thread_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        if thread.rows_affected() == 0 {
            tx.rollback().await.map_err(DbError::SqlxError)?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE scheduled_posts SET due_at = ? WHERE thread_id = ? AND status = 'scheduled'",
        )
        .bind(due_at)
        .bind(thread_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(true)
    }

    /// Row counts per status for the operator CLI.
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();

        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM scheduled_posts GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        for row in rows {
            let n: i64 = row.get("n");
            match row.get::<String, _>("status").as_str() {
                "scheduled" => stats.posts_scheduled = n,
                "published" => stats.posts_published = n,
                "failed" => stats.posts_failed = n,
                _ => {}
            }
        }

        let rows =
            sqlx::query("SELECT status, COUNT(*) AS n FROM scheduled_threads GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

        for row in rows {
            let n: i64 = row.get("n");
            match row.get::<String, _>("status").as_str() {
                "scheduled" => stats.threads_scheduled = n,
                "published" => stats.threads_published = n,
                "failed" => stats.threads_failed = n,
                _ => {}
            }
        }

        Ok(stats)
    }
}

const SELECT_POSTS: &str = r#"
    SELECT id, owner_id, content, media_refs, due_at, thread_id, position, status, error, remote_id, created_at
    FROM scheduled_posts
"#;

const SELECT_THREADS: &str = r#"
    SELECT id, owner_id, member_post_ids, due_at, status, error, created_at
    FROM scheduled_threads
"#;

fn post_from_row(row: &SqliteRow) -> ScheduledPost {
    let media_refs: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("media_refs")).unwrap_or_default();

    ScheduledPost {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        content: row.get("content"),
        media_refs,
        due_at: row.get("due_at"),
        thread_id: row.get("thread_id"),
        position: row.get("position"),
        status: ItemStatus::parse(&row.get::<String, _>("status"))
            .unwrap_or(ItemStatus::Scheduled),
        error: row.get("error"),
        remote_id: row.get("remote_id"),
        created_at: row.get("created_at"),
    }
}

fn thread_from_row(row: &SqliteRow) -> ScheduledThread {
    let member_post_ids: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("member_post_ids")).unwrap_or_default();

    ScheduledThread {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        member_post_ids,
        due_at: row.get("due_at"),
        status: ItemStatus::parse(&row.get::<String, _>("status"))
            .unwrap_or(ItemStatus::Scheduled),
        error: row.get("error"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ScheduledItemStore for Database {
    async fn get_due(&self, now: i64) -> Result<DueItems> {
        let post_rows = sqlx::query(&format!(
            "{} WHERE status = 'scheduled' AND due_at <= ? ORDER BY due_at ASC",
            SELECT_POSTS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let thread_rows = sqlx::query(&format!(
            "{} WHERE status = 'scheduled' AND due_at <= ? ORDER BY due_at ASC",
            SELECT_THREADS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(DueItems {
            posts: post_rows.iter().map(post_from_row).collect(),
            threads: thread_rows.iter().map(thread_from_row).collect(),
        })
    }

    async fn mark_post_published(&self, id: &str, remote_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published', remote_id = ?, error = NULL
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(remote_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn mark_post_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed', error = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn mark_thread_published(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_threads
            SET status = 'published', error = NULL
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn mark_thread_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_threads
            SET status = 'failed', error = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn get(&self, owner_id: &str) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT owner_id, access_token, refresh_token, expires_at, updated_at
            FROM credentials WHERE owner_id = ?
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| Credential {
            owner_id: r.get("owner_id"),
            access_token: r.get("access_token"),
            refresh_token: r.get("refresh_token"),
            expires_at: r.get("expires_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn put(&self, credential: &Credential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (owner_id, access_token, refresh_token, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(owner_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&credential.owner_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }
}
