//! Mock platform API for testing
//!
//! A scripted [`RemoteApi`] that records every call, hands out sequential
//! remote ids, and can be told to fail specific posts or the refresh
//! exchange. Integration tests use it to verify scheduler and publisher
//! behavior without network access or credentials.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::PublishError;
use crate::platform::{MediaHandle, RemoteApi, RemoteId, TokenGrant};
use crate::types::Credential;

/// One recorded create-post call.
#[derive(Debug, Clone)]
pub struct CreateCall {
    pub access_token: String,
    pub text: String,
    pub media: Vec<MediaHandle>,
    pub reply_to: Option<String>,
}

#[derive(Default)]
struct Inner {
    create_calls: Vec<CreateCall>,
    upload_calls: Vec<String>,
    refresh_calls: Vec<String>,
    /// Posts whose text contains this substring fail with `fail_error`.
    fail_when_contains: Option<String>,
    fail_error: Option<PublishError>,
    fail_refresh: Option<String>,
    grant: Option<TokenGrant>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct MockApi {
    inner: Arc<Mutex<Inner>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any create-post call whose text contains `needle`.
    pub fn fail_posts_containing(&self, needle: &str, error: PublishError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_when_contains = Some(needle.to_string());
        inner.fail_error = Some(error);
    }

    /// Fail every refresh-token exchange with the given message.
    pub fn fail_refresh(&self, message: &str) {
        self.inner.lock().unwrap().fail_refresh = Some(message.to_string());
    }

    /// Override the grant returned by refresh-token exchanges.
    pub fn set_refresh_grant(&self, grant: TokenGrant) {
        self.inner.lock().unwrap().grant = Some(grant);
    }

    pub fn create_call_count(&self) -> usize {
        self.inner.lock().unwrap().create_calls.len()
    }

    pub fn upload_call_count(&self) -> usize {
        self.inner.lock().unwrap().upload_calls.len()
    }

    pub fn refresh_call_count(&self) -> usize {
        self.inner.lock().unwrap().refresh_calls.len()
    }

    pub fn create_calls(&self) -> Vec<CreateCall> {
        self.inner.lock().unwrap().create_calls.clone()
    }

    pub fn uploaded_mime_types(&self) -> Vec<String> {
        self.inner.lock().unwrap().upload_calls.clone()
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn create_post(
        &self,
        credential: &Credential,
        text: &str,
        media: &[MediaHandle],
        reply_to: Option<&str>,
    ) -> Result<RemoteId, PublishError> {
        let mut inner = self.inner.lock().unwrap();

        inner.create_calls.push(CreateCall {
            access_token: credential.access_token.clone(),
            text: text.to_string(),
            media: media.to_vec(),
            reply_to: reply_to.map(|s| s.to_string()),
        });

        let should_fail = inner
            .fail_when_contains
            .as_deref()
            .is_some_and(|needle| text.contains(needle));
        if should_fail {
            let error = inner
                .fail_error
                .clone()
                .unwrap_or_else(|| PublishError::Remote("mock failure".to_string()));
            return Err(error);
        }

        inner.next_id += 1;
        Ok(format!("remote-{}", inner.next_id))
    }

    async fn upload_media(
        &self,
        _credential: &Credential,
        _data: &[u8],
        mime_type: &str,
    ) -> Result<MediaHandle, PublishError> {
        let mut inner = self.inner.lock().unwrap();
        inner.upload_calls.push(mime_type.to_string());
        inner.next_id += 1;
        Ok(format!("media-{}", inner.next_id))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, PublishError> {
        let mut inner = self.inner.lock().unwrap();
        inner.refresh_calls.push(refresh_token.to_string());

        if let Some(message) = &inner.fail_refresh {
            return Err(PublishError::Auth(message.clone()));
        }

        if let Some(grant) = &inner.grant {
            return Ok(grant.clone());
        }

        inner.next_id += 1;
        Ok(TokenGrant {
            access_token: format!("refreshed-{}", inner.next_id),
            refresh_token: Some(format!("rotated-{}", inner.next_id)),
            expires_in: 7200,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            owner_id: "owner-1".to_string(),
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: i64::MAX,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_mock_records_calls_and_ids_are_sequential() {
        let api = MockApi::new();

        let first = api
            .create_post(&credential(), "one", &[], None)
            .await
            .unwrap();
        let second = api
            .create_post(&credential(), "two", &[], Some(&first))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(api.create_call_count(), 2);

        let calls = api.create_calls();
        assert_eq!(calls[0].reply_to, None);
        assert_eq!(calls[1].reply_to, Some(first));
    }

    #[tokio::test]
    async fn test_mock_scripted_failure() {
        let api = MockApi::new();
        api.fail_posts_containing("boom", PublishError::Remote("503".to_string()));

        assert!(api.create_post(&credential(), "fine", &[], None).await.is_ok());
        let result = api.create_post(&credential(), "boom here", &[], None).await;
        assert!(matches!(result, Err(PublishError::Remote(_))));

        // Failed attempts are still recorded
        assert_eq!(api.create_call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_refresh_failure() {
        let api = MockApi::new();
        api.fail_refresh("revoked");

        let result = api.refresh_token("old-refresh").await;
        assert!(matches!(result, Err(PublishError::Auth(_))));
        assert_eq!(api.refresh_call_count(), 1);
    }
}
