//! Publishing of single posts and reply chains
//!
//! The publisher performs the actual remote writes for one post or one
//! ordered thread, given valid credentials from the broker. Validation
//! happens before any remote call, so a rejected post carries no remote
//! side effect.

use std::sync::Arc;
use tracing::{debug, info};

use crate::credentials::CredentialBroker;
use crate::error::{PublishError, ThreadPublishError};
use crate::media::MediaStore;
use crate::platform::{MediaHandle, RemoteApi, RemoteId};
use crate::types::{ScheduledPost, MAX_MEDIA_PER_POST, MAX_POST_CHARS};

pub struct Publisher {
    api: Arc<dyn RemoteApi>,
    media: Arc<dyn MediaStore>,
    credentials: CredentialBroker,
}

impl Publisher {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        media: Arc<dyn MediaStore>,
        credentials: CredentialBroker,
    ) -> Self {
        Self {
            api,
            media,
            credentials,
        }
    }

    /// Publish one standalone post. Uploads its media refs in order, then
    /// creates the post with the resulting handles attached.
    pub async fn publish_post(
        &self,
        post: &ScheduledPost,
        now: i64,
    ) -> Result<RemoteId, PublishError> {
        self.publish_one(post, None, now).await
    }

    /// Publish an ordered sequence of posts as one reply chain. Each item
    /// after the first is submitted as a reply to the previous item's remote
    /// id. Stops at the first failure; remote ids already obtained in this
    /// call are carried in the error so those members can be marked
    /// published.
    pub async fn publish_thread(
        &self,
        members: &[ScheduledPost],
        now: i64,
    ) -> Result<Vec<RemoteId>, ThreadPublishError> {
        let mut posted: Vec<RemoteId> = Vec::with_capacity(members.len());
        let mut reply_to: Option<RemoteId> = None;

        for (index, member) in members.iter().enumerate() {
            match self.publish_one(member, reply_to.as_deref(), now).await {
                Ok(remote_id) => {
                    debug!(post_id = %member.id, remote_id = %remote_id, "thread member posted");
                    reply_to = Some(remote_id.clone());
                    posted.push(remote_id);
                }
                Err(cause) => {
                    return Err(ThreadPublishError {
                        failed_index: index,
                        cause,
                        posted,
                    });
                }
            }
        }

        Ok(posted)
    }

    async fn publish_one(
        &self,
        post: &ScheduledPost,
        reply_to: Option<&str>,
        now: i64,
    ) -> Result<RemoteId, PublishError> {
        validate(post)?;

        let credential = self.credentials.get_valid(&post.owner_id, now).await?;

        let mut handles: Vec<MediaHandle> = Vec::with_capacity(post.media_refs.len());
        for media_ref in &post.media_refs {
            let blob = self.media.load(media_ref).await?;
            let handle = self
                .api
                .upload_media(&credential, &blob.data, blob.mime_type)
                .await?;
            handles.push(handle);
        }

        let remote_id = self
            .api
            .create_post(&credential, &post.content, &handles, reply_to)
            .await?;

        info!(post_id = %post.id, remote_id = %remote_id, "post published");
        Ok(remote_id)
    }
}

/// Caller-contract checks, applied before any remote call.
fn validate(post: &ScheduledPost) -> Result<(), PublishError> {
    if post.content.trim().is_empty() {
        return Err(PublishError::Validation("content cannot be empty".to_string()));
    }

    let char_count = post.content.chars().count();
    if char_count > MAX_POST_CHARS {
        return Err(PublishError::Validation(format!(
            "content exceeds the {} character limit (current: {} characters)",
            MAX_POST_CHARS, char_count
        )));
    }

    if post.media_refs.len() > MAX_MEDIA_PER_POST {
        return Err(PublishError::Validation(format!(
            "at most {} media attachments are allowed (got {})",
            MAX_MEDIA_PER_POST,
            post.media_refs.len()
        )));
    }

    Ok(())
}
