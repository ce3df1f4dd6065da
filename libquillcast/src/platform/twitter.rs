//! Platform client for the X (Twitter) v2 write API

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::config::PlatformConfig;
use crate::error::PublishError;
use crate::platform::{MediaHandle, RemoteApi, RemoteId, TokenGrant};
use crate::types::Credential;

pub struct TwitterApi {
    http: Client,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl TwitterApi {
    /// Build a client from configuration. The request timeout bounds every
    /// remote call; a timed-out call surfaces as a `Network` publish error.
    pub fn new(config: &PlatformConfig) -> Result<Self, PublishError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PublishError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Basic auth header for OAuth token requests
    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

/// Request body for the create-post endpoint. Reply and media blocks are
/// omitted entirely when absent; the API rejects empty objects.
fn build_post_body(text: &str, media: &[MediaHandle], reply_to: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({ "text": text });

    if let Some(parent_id) = reply_to {
        body["reply"] = serde_json::json!({ "in_reply_to_tweet_id": parent_id });
    }

    if !media.is_empty() {
        body["media"] = serde_json::json!({ "media_ids": media });
    }

    body
}

/// Map an HTTP error response to the publish-error taxonomy.
fn map_status(status: StatusCode, body: &str) -> PublishError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PublishError::Auth(format!("platform returned {}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            PublishError::Remote(format!("rate limit exceeded: {}", body))
        }
        _ => PublishError::Remote(format!("platform returned {}: {}", status, body)),
    }
}

/// Map a transport-level failure. Timeouts and connection errors are
/// `Network`; anything else that reqwest reports is treated the same way.
fn map_transport(error: reqwest::Error) -> PublishError {
    if error.is_timeout() {
        PublishError::Network(format!("request timed out: {}", error))
    } else {
        PublishError::Network(format!("request failed: {}", error))
    }
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    data: MediaUploadData,
}

#[derive(Debug, Deserialize)]
struct MediaUploadData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[async_trait]
impl RemoteApi for TwitterApi {
    async fn create_post(
        &self,
        credential: &Credential,
        text: &str,
        media: &[MediaHandle],
        reply_to: Option<&str>,
    ) -> Result<RemoteId, PublishError> {
        let body = build_post_body(text, media, reply_to);

        let resp = self
            .http
            .post(self.url("/2/tweets"))
            .header("Authorization", format!("Bearer {}", credential.access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(map_transport)?;

        if !status.is_success() {
            return Err(map_status(status, &text));
        }

        let parsed: PostResponse = serde_json::from_str(&text).map_err(|e| {
            PublishError::Remote(format!("failed to parse create response: {} - body: {}", e, text))
        })?;

        Ok(parsed.data.id)
    }

    async fn upload_media(
        &self,
        credential: &Credential,
        data: &[u8],
        mime_type: &str,
    ) -> Result<MediaHandle, PublishError> {
        let media_category = if mime_type == "image/gif" {
            "tweet_gif"
        } else {
            "tweet_image"
        };

        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .mime_str(mime_type)
            .map_err(|e| PublishError::Validation(format!("invalid mime type: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .text("media_category", media_category.to_string())
            .text("media_type", mime_type.to_string())
            .part("media", part);

        let resp = self
            .http
            .post(self.url("/2/media/upload"))
            .header("Authorization", format!("Bearer {}", credential.access_token))
            .multipart(form)
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(map_transport)?;

        if !status.is_success() {
            return Err(map_status(status, &text));
        }

        let parsed: MediaUploadResponse = serde_json::from_str(&text).map_err(|e| {
            PublishError::Remote(format!("failed to parse upload response: {} - body: {}", e, text))
        })?;

        Ok(parsed.data.id)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, PublishError> {
        let params = [
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http
            .post(self.url("/2/oauth2/token"))
            .header("Authorization", self.basic_auth_header())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await
            .map_err(map_transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(map_transport)?;

        if !status.is_success() {
            return Err(PublishError::Auth(format!(
                "token refresh rejected ({}): {}",
                status, text
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            PublishError::Auth(format!("failed to parse token response: {} - body: {}", e, text))
        })?;

        Ok(TokenGrant {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_in: parsed.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_body_text_only() {
        let body = build_post_body("Hello", &[], None);
        assert_eq!(body["text"], "Hello");
        assert!(body.get("reply").is_none());
        assert!(body.get("media").is_none());
    }

    #[test]
    fn test_post_body_with_reply() {
        let body = build_post_body("Hello", &[], Some("12345"));
        assert_eq!(body["reply"]["in_reply_to_tweet_id"], "12345");
    }

    #[test]
    fn test_post_body_with_media() {
        let media = vec!["m1".to_string(), "m2".to_string()];
        let body = build_post_body("Hello", &media, None);
        assert_eq!(body["media"]["media_ids"][0], "m1");
        assert_eq!(body["media"]["media_ids"][1], "m2");
    }

    #[test]
    fn test_map_status_auth() {
        let error = map_status(StatusCode::UNAUTHORIZED, "bad token");
        assert!(matches!(error, PublishError::Auth(_)));

        let error = map_status(StatusCode::FORBIDDEN, "suspended");
        assert!(matches!(error, PublishError::Auth(_)));
    }

    #[test]
    fn test_map_status_rate_limit_and_server_errors() {
        let error = map_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        match error {
            PublishError::Remote(msg) => assert!(msg.contains("rate limit")),
            other => panic!("expected remote error, got {:?}", other),
        }

        let error = map_status(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(matches!(error, PublishError::Remote(_)));
    }

    #[test]
    fn test_basic_auth_header() {
        let config = PlatformConfig {
            api_base: "https://api.example.test".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            request_timeout_secs: 5,
        };
        let api = TwitterApi::new(&config).unwrap();

        let header = api.basic_auth_header();
        let encoded = base64::engine::general_purpose::STANDARD.encode("id:secret");
        assert_eq!(header, format!("Basic {}", encoded));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = PlatformConfig {
            api_base: "https://api.example.test/".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            request_timeout_secs: 5,
        };
        let api = TwitterApi::new(&config).unwrap();
        assert_eq!(api.url("/2/tweets"), "https://api.example.test/2/tweets");
    }
}
