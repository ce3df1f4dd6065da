//! Credential brokering for the publisher
//!
//! Token refresh is concentrated in one place: [`CredentialBroker::get_valid`]
//! checks expiry and refreshes atomically, persisting the new token pair
//! before it is ever used. Call sites never mutate credential state
//! themselves.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::PublishError;
use crate::platform::RemoteApi;
use crate::store::CredentialStore;
use crate::types::Credential;

/// Safety margin subtracted from `expires_in`, so a token is refreshed
/// slightly before the platform would start rejecting it.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Clone)]
pub struct CredentialBroker {
    store: Arc<dyn CredentialStore>,
    api: Arc<dyn RemoteApi>,
}

impl CredentialBroker {
    pub fn new(store: Arc<dyn CredentialStore>, api: Arc<dyn RemoteApi>) -> Self {
        Self { store, api }
    }

    /// Return a credential that is valid at `now`, refreshing and persisting
    /// it first if needed.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Auth` when no credential is stored for the
    /// owner, when the token is expired with no refresh token, or when the
    /// refresh exchange fails. A publish is never attempted with a stale
    /// token.
    pub async fn get_valid(&self, owner_id: &str, now: i64) -> Result<Credential, PublishError> {
        let credential = self
            .store
            .get(owner_id)
            .await
            .map_err(|e| PublishError::Auth(format!("credential lookup failed: {}", e)))?
            .ok_or_else(|| {
                PublishError::Auth(format!("no credentials stored for owner {}", owner_id))
            })?;

        if !credential.is_expired(now) {
            return Ok(credential);
        }

        let Some(refresh_token) = credential.refresh_token.clone() else {
            return Err(PublishError::Auth(format!(
                "access token for owner {} is expired and no refresh token is available",
                owner_id
            )));
        };

        debug!(owner_id, "access token expired, refreshing");

        let grant = self
            .api
            .refresh_token(&refresh_token)
            .await
            .map_err(|e| PublishError::Auth(format!("token refresh failed: {}", e)))?;

        let refreshed = Credential {
            owner_id: credential.owner_id.clone(),
            access_token: grant.access_token,
            // Keep the previous refresh token when the platform doesn't
            // rotate it.
            refresh_token: grant.refresh_token.or(credential.refresh_token),
            expires_at: now + (grant.expires_in - EXPIRY_MARGIN_SECS).max(0),
            updated_at: now,
        };

        self.store
            .put(&refreshed)
            .await
            .map_err(|e| PublishError::Auth(format!("failed to persist refreshed token: {}", e)))?;

        info!(owner_id, "credential refreshed");
        Ok(refreshed)
    }
}
