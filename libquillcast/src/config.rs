//! Configuration management for Quillcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub media: MediaConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Settings for the platform's write API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// OAuth application credentials used for refresh-token exchanges.
    pub client_id: String,
    pub client_secret: String,
    /// Upper bound on any single remote call, in seconds. A timed-out call
    /// is recorded as an ordinary publish failure.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory the dashboard's upload service writes media files into.
    /// Media refs on scheduled posts are paths relative to this directory.
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between sweeps of the publication queue.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.x.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    60
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("QUILLCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("quillcast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("quillcast"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[database]
path = "/tmp/quillcast/queue.db"

[platform]
api_base = "https://api.example.test"
client_id = "client-abc"
client_secret = "secret-xyz"
request_timeout_secs = 10

[media]
directory = "/tmp/quillcast/media"

[scheduling]
poll_interval = 30
"#,
        );

        let config = Config::load_from_path(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.database.path, "/tmp/quillcast/queue.db");
        assert_eq!(config.platform.api_base, "https://api.example.test");
        assert_eq!(config.platform.client_id, "client-abc");
        assert_eq!(config.platform.request_timeout_secs, 10);
        assert_eq!(config.media.directory, "/tmp/quillcast/media");
        assert_eq!(config.scheduling.poll_interval, 30);
    }

    #[test]
    fn test_load_applies_defaults() {
        let file = write_config(
            r#"
[database]
path = "/tmp/queue.db"

[platform]
client_id = "client-abc"
client_secret = "secret-xyz"

[media]
directory = "/tmp/media"
"#,
        );

        let config = Config::load_from_path(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.platform.api_base, "https://api.x.com");
        assert_eq!(config.platform.request_timeout_secs, 30);
        assert_eq!(config.scheduling.poll_interval, 60);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_path(&PathBuf::from("/nonexistent/quillcast.toml"));
        assert!(matches!(
            result,
            Err(crate::error::QuillcastError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = write_config("[database\npath = broken");
        let result = Config::load_from_path(&file.path().to_path_buf());
        assert!(matches!(
            result,
            Err(crate::error::QuillcastError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_env_override() {
        std::env::set_var("QUILLCAST_CONFIG", "/tmp/custom/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("QUILLCAST_CONFIG");

        assert_eq!(path, PathBuf::from("/tmp/custom/config.toml"));
    }
}
