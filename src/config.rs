//! Configuration module for ReadKey.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{ReadkeyError, Result};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/readkey.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    /// Poll interval used when a feed carries no refresh hint.
    #[serde(default = "default_refresh")]
    pub default_refresh_secs: u64,
    /// Lower bound applied to feed-supplied refresh hints.
    #[serde(default = "default_min_refresh")]
    pub min_refresh_secs: u64,
    /// Initial capacity of the per-source recent-items window.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    /// Length of the persisted latest-items list per source.
    #[serde(default = "default_latest_capacity")]
    pub latest_capacity: usize,
    /// Number of latest items copied into a new subscriber's unread set.
    #[serde(default = "default_initial_unread")]
    pub initial_unread: usize,
    /// Consecutive failed polls before a source stops polling.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Maximum item content length in characters.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Feed URLs established at startup.
    #[serde(default)]
    pub seed_urls: Vec<String>,
}

fn default_refresh() -> u64 {
    60
}

fn default_min_refresh() -> u64 {
    10
}

fn default_recent_window() -> usize {
    50
}

fn default_latest_capacity() -> usize {
    100
}

fn default_initial_unread() -> usize {
    15
}

fn default_max_poll_failures() -> u32 {
    1
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_content_length() -> usize {
    100_000
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

impl FeederConfig {
    /// Poll interval used when a feed carries no refresh hint.
    pub fn default_refresh(&self) -> Duration {
        Duration::from_secs(self.default_refresh_secs)
    }

    /// Resolve the delay before the next poll from a feed-supplied hint.
    pub fn refresh_interval(&self, hint_secs: Option<u64>) -> Duration {
        match hint_secs {
            Some(secs) => Duration::from_secs(secs.max(self.min_refresh_secs)),
            None => self.default_refresh(),
        }
    }
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            default_refresh_secs: default_refresh(),
            min_refresh_secs: default_min_refresh(),
            recent_window: default_recent_window(),
            latest_capacity: default_latest_capacity(),
            initial_unread: default_initial_unread(),
            max_poll_failures: default_max_poll_failures(),
            max_feed_size_bytes: default_max_feed_size(),
            max_content_length: default_max_content_length(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            seed_urls: vec![],
        }
    }
}

/// How keywords are produced for new items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMode {
    /// Call the external keyword service.
    Service,
    /// Use a truncated plain-text summary instead of keywords.
    Summary,
    /// Persist entries without keywords.
    Disabled,
}

/// Keyword enrichment configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordConfig {
    /// Extraction mode.
    #[serde(default = "default_keyword_mode")]
    pub mode: KeywordMode,
    /// Keyword service endpoint.
    #[serde(default = "default_keyword_endpoint")]
    pub endpoint: String,
    /// Attempts per item before giving up.
    #[serde(default = "default_keyword_retry")]
    pub retry: u32,
    /// Time an item waits for its keywords before being stored without them.
    #[serde(default = "default_keyword_timeout")]
    pub timeout_secs: u64,
    /// Number of keywords requested from the service.
    #[serde(default = "default_keyword_size")]
    pub result_size: usize,
    /// Timeout for a single request to the service.
    #[serde(default = "default_keyword_request_timeout")]
    pub request_timeout_secs: u64,
    /// Characters kept by the summary extractor.
    #[serde(default = "default_summary_size")]
    pub summary_size: usize,
}

fn default_keyword_mode() -> KeywordMode {
    KeywordMode::Service
}

fn default_keyword_endpoint() -> String {
    "http://localhost:4567/keywords".to_string()
}

fn default_keyword_retry() -> u32 {
    3
}

fn default_keyword_timeout() -> u64 {
    10
}

fn default_keyword_size() -> usize {
    5
}

fn default_keyword_request_timeout() -> u64 {
    5
}

fn default_summary_size() -> usize {
    30
}

impl KeywordConfig {
    /// Time an item waits for its keywords.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            mode: default_keyword_mode(),
            endpoint: default_keyword_endpoint(),
            retry: default_keyword_retry(),
            timeout_secs: default_keyword_timeout(),
            result_size: default_keyword_size(),
            request_timeout_secs: default_keyword_request_timeout(),
            summary_size: default_summary_size(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot backing the in-memory store (memory only if unset).
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed polling configuration.
    #[serde(default)]
    pub feeder: FeederConfig,
    /// Keyword enrichment configuration.
    #[serde(default)]
    pub keyword: KeywordConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ReadkeyError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ReadkeyError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `READKEY_KEYWORD_ENDPOINT`: Override the keyword service endpoint
    /// - `READKEY_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("READKEY_KEYWORD_ENDPOINT") {
            if !endpoint.is_empty() {
                self.keyword.endpoint = endpoint;
            }
        }
        if let Ok(level) = std::env::var("READKEY_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.feeder.recent_window == 0 {
            return Err(ReadkeyError::Config(
                "feeder.recent_window must be at least 1".to_string(),
            ));
        }
        if self.feeder.latest_capacity == 0 {
            return Err(ReadkeyError::Config(
                "feeder.latest_capacity must be at least 1".to_string(),
            ));
        }
        if self.feeder.max_poll_failures == 0 {
            return Err(ReadkeyError::Config(
                "feeder.max_poll_failures must be at least 1".to_string(),
            ));
        }
        if self.keyword.mode == KeywordMode::Service {
            url::Url::parse(&self.keyword.endpoint).map_err(|e| {
                ReadkeyError::Config(format!(
                    "invalid keyword endpoint {}: {e}",
                    self.keyword.endpoint
                ))
            })?;
        }
        Ok(())
    }
}
