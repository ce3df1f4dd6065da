//! Error types for Quillcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuillcastError>;

#[derive(Error, Debug)]
pub enum QuillcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl QuillcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            QuillcastError::InvalidInput(_) => 3,
            QuillcastError::Publish(PublishError::Auth(_)) => 2,
            QuillcastError::Publish(_) => 1,
            QuillcastError::Config(_) => 1,
            QuillcastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure of a single publish attempt.
///
/// Every variant is terminal for the item being published: the scheduler
/// records the message and never retries automatically.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// Caught before any remote call; no remote side effect occurred.
    #[error("Content validation failed: {0}")]
    Validation(String),

    /// Credential missing, expired without a refresh token, or refresh failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The platform rejected the request (4xx/5xx, rate limit).
    #[error("Platform rejected the request: {0}")]
    Remote(String),

    /// Transport failure or request timeout.
    #[error("Network error: {0}")]
    Network(String),
}

/// A reply chain that failed partway through.
///
/// Remote ids for the members posted before the failure are retained so the
/// caller can mark those members published even though the thread as a whole
/// failed.
#[derive(Error, Debug)]
#[error("reply chain failed at item {failed_index}: {cause}")]
pub struct ThreadPublishError {
    /// Index into the ordered member slice of the item that failed.
    pub failed_index: usize,
    pub cause: PublishError,
    /// Remote ids obtained for items `0..failed_index`.
    pub posted: Vec<String>,
}
