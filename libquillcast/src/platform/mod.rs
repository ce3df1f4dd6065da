//! Platform write-API abstraction
//!
//! The publisher and credential broker talk to the platform through the
//! [`RemoteApi`] trait. The production implementation in [`twitter`] fronts
//! the platform's v2 HTTP API; [`mock`] provides a scripted stand-in for
//! tests.

use async_trait::async_trait;

use crate::error::PublishError;
use crate::types::Credential;

pub mod twitter;

// Mock API is available for all builds (not just tests) to support
// integration tests.
pub mod mock;

/// Platform identifier of a published post.
pub type RemoteId = String;

/// Platform handle for an uploaded media blob, attachable to a post.
pub type MediaHandle = String;

/// Token pair returned by the platform's refresh-token exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Some platforms rotate the refresh token on every exchange; absent
    /// means the previous refresh token remains valid.
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create a post, optionally as a reply to an earlier post and/or with
    /// attached media handles.
    async fn create_post(
        &self,
        credential: &Credential,
        text: &str,
        media: &[MediaHandle],
        reply_to: Option<&str>,
    ) -> Result<RemoteId, PublishError>;

    /// Upload one media blob, returning the platform's media handle.
    async fn upload_media(
        &self,
        credential: &Credential,
        data: &[u8],
        mime_type: &str,
    ) -> Result<MediaHandle, PublishError>;

    /// Exchange a refresh token for a fresh token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, PublishError>;
}
