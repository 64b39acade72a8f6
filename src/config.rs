//! Configuration file parser for ~/.config/readn/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::app::Tuning;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level client configuration.
///
/// Every field has a default so any subset of keys can be specified. The
/// `Debug` impl masks `password`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the feed server.
    pub server_url: String,

    /// HTTP basic auth user. Auth is only sent when a password is known too.
    pub username: Option<String>,

    /// HTTP basic auth password (alternative to READN_PASSWORD env var).
    /// Env var takes precedence over config file.
    pub password: Option<String>,

    /// Window title shown before the unread count.
    pub base_title: String,

    /// Status re-request interval while the server reports a running crawl.
    pub status_poll_ms: u64,

    /// Quiet period before derived statistics are recomputed.
    pub stats_debounce_ms: u64,

    /// Quiet period before a column width is written back.
    pub width_debounce_ms: u64,

    /// Quiet period before search text triggers a reload.
    pub search_debounce_ms: u64,

    /// Bottom threshold (at a 16px root font) for eager page loads.
    pub bottom_space_px: f64,

    /// Margin kept around a target scrolled into view.
    pub scroll_padding_px: f64,

    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:7070".to_string(),
            username: None,
            password: None,
            base_title: "readn".to_string(),
            status_poll_ms: 500,
            stats_debounce_ms: 500,
            width_debounce_ms: 1000,
            search_debounce_ms: 500,
            bottom_space_px: 70.0,
            scroll_padding_px: 10.0,
            request_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("base_title", &self.base_title)
            .field("status_poll_ms", &self.status_poll_ms)
            .field("stats_debounce_ms", &self.stats_debounce_ms)
            .field("width_debounce_ms", &self.width_debounce_ms)
            .field("search_debounce_ms", &self.search_debounce_ms)
            .field("bottom_space_px", &self.bottom_space_px)
            .field("scroll_padding_px", &self.scroll_padding_px)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "server_url",
        "username",
        "password",
        "base_title",
        "status_poll_ms",
        "stats_debounce_ms",
        "width_debounce_ms",
        "search_debounce_ms",
        "bottom_space_px",
        "scroll_padding_px",
        "request_timeout_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(server = %config.server_url, "Loaded configuration");
        Ok(config)
    }

    /// Password from READN_PASSWORD, falling back to the config file.
    pub fn resolve_password(&self) -> Option<String> {
        std::env::var("READN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| self.password.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tuning(&self) -> Tuning {
        Tuning {
            base_title: self.base_title.clone(),
            status_poll: Duration::from_millis(self.status_poll_ms),
            stats_debounce: Duration::from_millis(self.stats_debounce_ms),
            width_debounce: Duration::from_millis(self.width_debounce_ms),
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            bottom_space_px: self.bottom_space_px,
            scroll_padding_px: self.scroll_padding_px,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.status_poll_ms, 500);
        assert_eq!(config.width_debounce_ms, 1000);
        assert_eq!(config.bottom_space_px, 70.0);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/readn_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.base_title, "readn");
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("readn_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "server_url = \"https://feeds.example.com/\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server_url, "https://feeds.example.com/");
        assert_eq!(config.search_debounce_ms, 500);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n").unwrap();
        assert_eq!(config.stats_debounce_ms, 500);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("base_title = \"news\"\nfancy = 1\n").unwrap();
        assert_eq!(config.base_title, "news");
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("status_poll_ms = \"fast\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("readn_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_tuning_from_config() {
        let config = Config::parse("width_debounce_ms = 250\nbase_title = \"inbox\"\n").unwrap();
        let tuning = config.tuning();
        assert_eq!(tuning.width_debounce, Duration::from_millis(250));
        assert_eq!(tuning.status_poll, Duration::from_millis(500));
        assert_eq!(tuning.base_title, "inbox");
    }

    #[test]
    fn test_debug_masks_password() {
        let config = Config {
            password: Some("hunter2-secret".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("hunter2-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
