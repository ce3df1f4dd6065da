//! Media resolution for scheduled posts
//!
//! Media refs on a scheduled post are opaque to the scheduler; the media
//! store resolves them to bytes plus a mime type just before upload. The
//! production implementation reads files the dashboard's upload service
//! placed under a configured directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::PublishError;

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

/// Resolved media content ready for upload.
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Resolve one media ref. Failures are `Validation` errors: they are
    /// caught before any remote call and carry no remote side effect.
    async fn load(&self, media_ref: &str) -> Result<MediaBlob, PublishError>;
}

/// Filesystem-backed media store rooted at the configured media directory.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Media refs must stay inside the media directory.
    fn resolve(&self, media_ref: &str) -> Result<PathBuf, PublishError> {
        let path = Path::new(media_ref);
        if path.is_absolute() {
            return Err(PublishError::Validation(format!(
                "media ref must be relative: {}",
                media_ref
            )));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PublishError::Validation(format!(
                "media ref may not traverse outside the media directory: {}",
                media_ref
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn load(&self, media_ref: &str) -> Result<MediaBlob, PublishError> {
        let path = self.resolve(media_ref)?;

        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageMimeType::from_extension)
            .ok_or_else(|| {
                PublishError::Validation(format!("unsupported media type: {}", media_ref))
            })?;

        let data = tokio::fs::read(&path).await.map_err(|e| {
            PublishError::Validation(format!("failed to read media file {}: {}", media_ref, e))
        })?;

        Ok(MediaBlob {
            data,
            mime_type: mime.as_str(),
        })
    }
}

/// In-memory media store for tests.
#[derive(Clone, Default)]
pub struct MemoryMediaStore {
    blobs: Arc<Mutex<HashMap<String, MediaBlob>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, media_ref: &str, data: Vec<u8>, mime_type: &'static str) {
        self.blobs
            .lock()
            .unwrap()
            .insert(media_ref.to_string(), MediaBlob { data, mime_type });
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn load(&self, media_ref: &str) -> Result<MediaBlob, PublishError> {
        self.blobs
            .lock()
            .unwrap()
            .get(media_ref)
            .cloned()
            .ok_or_else(|| PublishError::Validation(format!("unknown media ref: {}", media_ref)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(ImageMimeType::from_extension("jpg"), Some(ImageMimeType::Jpeg));
        assert_eq!(ImageMimeType::from_extension("JPEG"), Some(ImageMimeType::Jpeg));
        assert_eq!(ImageMimeType::from_extension("png"), Some(ImageMimeType::Png));
        assert_eq!(ImageMimeType::from_extension("gif"), Some(ImageMimeType::Gif));
        assert_eq!(ImageMimeType::from_extension("webp"), Some(ImageMimeType::WebP));
        assert_eq!(ImageMimeType::from_extension("mp4"), None);
        assert_eq!(ImageMimeType::from_extension(""), None);
    }

    #[tokio::test]
    async fn test_fs_store_round_trip() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sunset.png"), b"png bytes").unwrap();

        let store = FsMediaStore::new(dir.path());
        let blob = store.load("sunset.png").await.unwrap();

        assert_eq!(blob.data, b"png bytes");
        assert_eq!(blob.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_fs_store_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsMediaStore::new(dir.path());

        let result = store.load("../outside.png").await;
        assert!(matches!(result, Err(PublishError::Validation(_))));

        let result = store.load("/etc/passwd.png").await;
        assert!(matches!(result, Err(PublishError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fs_store_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"video").unwrap();

        let store = FsMediaStore::new(dir.path());
        let result = store.load("clip.mp4").await;
        assert!(matches!(result, Err(PublishError::Validation(_))));
    }

    #[tokio::test]
    async fn test_fs_store_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = FsMediaStore::new(dir.path());

        let result = store.load("missing.jpg").await;
        assert!(matches!(result, Err(PublishError::Validation(_))));
    }
}
