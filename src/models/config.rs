//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Match criteria applied to extracted records
    #[serde(default)]
    pub filter: FilterConfig,

    /// Notice board retrieval settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Push delivery settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Notified-set housekeeping
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// File names inside the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    ///
    /// A missing file is logged at info, an unreadable or malformed one at warn.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                log::warn!("Config load failed from {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Apply `MONITOR_CONFIG`, `NOTIFICATION_TOKEN` and `NOTIFICATION_TYPE`
    /// from the process environment.
    pub fn with_process_env(self) -> Self {
        let monitor = std::env::var("MONITOR_CONFIG").ok();
        let token = std::env::var("NOTIFICATION_TOKEN").ok();
        let channel = std::env::var("NOTIFICATION_TYPE").ok();
        self.with_env_overrides(monitor.as_deref(), token, channel.as_deref())
    }

    /// Apply environment-style overrides.
    ///
    /// `monitor_json` uses the snake_case keys of the hosted workflow
    /// (`exam_types`, `locations`, `exclude_keywords`, `include_keywords`,
    /// `timeout` in milliseconds, `retries`, `concurrency`,
    /// `max_recent_notifications`). Malformed JSON resets the filter to an
    /// unrestricted one.
    pub fn with_env_overrides(
        mut self,
        monitor_json: Option<&str>,
        token: Option<String>,
        channel: Option<&str>,
    ) -> Self {
        if let Some(raw) = monitor_json.filter(|s| !s.trim().is_empty()) {
            match serde_json::from_str::<MonitorOverrides>(raw) {
                Ok(overrides) => overrides.apply(&mut self),
                Err(e) => {
                    log::warn!("MONITOR_CONFIG is not valid JSON ({e}). Using an unrestricted filter.");
                    self.filter = FilterConfig::default();
                }
            }
        }

        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.notify.token = Some(token);
        }

        if let Some(name) = channel {
            match NotifyChannel::parse(name) {
                Some(parsed) => self.notify.channel = parsed,
                None => log::warn!(
                    "Unknown NOTIFICATION_TYPE '{}', keeping {}",
                    name,
                    self.notify.channel
                ),
            }
        }

        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        url::Url::parse(&self.fetch.board_url).map_err(|e| {
            AppError::validation(format!("fetch.board_url is not a valid URL: {e}"))
        })?;
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::validation("fetch.max_concurrent must be > 0"));
        }
        if self.fetch.max_recent_notifications == 0 {
            return Err(AppError::validation(
                "fetch.max_recent_notifications must be > 0",
            ));
        }
        if self.paths.notified_file.trim().is_empty() || self.paths.snapshot_file.trim().is_empty()
        {
            return Err(AppError::validation("paths entries must not be empty"));
        }
        if self.paths.notified_file == self.paths.snapshot_file {
            return Err(AppError::validation(
                "paths.notified_file and paths.snapshot_file must differ",
            ));
        }
        Ok(())
    }
}

/// Match criteria. An empty list places no constraint on its axis.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FilterConfig {
    #[serde(default)]
    pub exam_types: Vec<String>,

    #[serde(default)]
    pub locations: Vec<String>,

    #[serde(default)]
    pub exclude_keywords: Vec<String>,

    #[serde(default)]
    pub include_keywords: Vec<String>,
}

/// Notice board retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Listing page of the notice board
    #[serde(default = "defaults::board_url")]
    pub board_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra attempts per page after the first failure
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Detail pages fetched per batch
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Pause between detail batches in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Only the newest N board entries are fetched
    #[serde(default = "defaults::max_recent_notifications")]
    pub max_recent_notifications: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            board_url: defaults::board_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retries: defaults::retries(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: defaults::request_delay(),
            max_recent_notifications: defaults::max_recent_notifications(),
        }
    }
}

/// Supported push services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    #[default]
    ServerChan,
    PushPlus,
}

impl NotifyChannel {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "serverchan" => Some(Self::ServerChan),
            "pushplus" => Some(Self::PushPlus),
            _ => None,
        }
    }
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerChan => f.write_str("serverchan"),
            Self::PushPlus => f.write_str("pushplus"),
        }
    }
}

/// Push delivery settings. Delivery is disabled without a token.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub channel: NotifyChannel,

    #[serde(default)]
    pub token: Option<String>,
}

impl NotifyConfig {
    pub fn enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Notified-set housekeeping settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    /// Evict ids whose exam date is older than this many days
    #[serde(default)]
    pub retention_days: Option<u32>,
}

/// Persisted file names, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::notified_file")]
    pub notified_file: String,

    #[serde(default = "defaults::snapshot_file")]
    pub snapshot_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            notified_file: defaults::notified_file(),
            snapshot_file: defaults::snapshot_file(),
        }
    }
}

/// Overrides accepted through `MONITOR_CONFIG`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MonitorOverrides {
    exam_types: Option<Vec<String>>,
    locations: Option<Vec<String>>,
    exclude_keywords: Option<Vec<String>>,
    include_keywords: Option<Vec<String>>,
    timeout: Option<u64>,
    retries: Option<u32>,
    concurrency: Option<usize>,
    max_recent_notifications: Option<usize>,
}

impl MonitorOverrides {
    fn apply(self, config: &mut Config) {
        config.filter = FilterConfig {
            exam_types: self.exam_types.unwrap_or_default(),
            locations: self.locations.unwrap_or_default(),
            exclude_keywords: self.exclude_keywords.unwrap_or_default(),
            include_keywords: self.include_keywords.unwrap_or_default(),
        };

        if let Some(ms) = self.timeout.filter(|ms| *ms > 0) {
            config.fetch.timeout_secs = ms.div_ceil(1000);
        }
        if let Some(retries) = self.retries {
            config.fetch.retries = retries;
        }
        if let Some(concurrency) = self.concurrency.filter(|c| *c > 0) {
            config.fetch.max_concurrent = concurrency;
        }
        if let Some(max_recent) = self.max_recent_notifications.filter(|n| *n > 0) {
            config.fetch.max_recent_notifications = max_recent;
        }
    }
}

mod defaults {
    // Fetch defaults
    pub fn board_url() -> String {
        "http://www.ragd.org.cn/kstz".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn retries() -> u32 {
        3
    }
    pub fn max_concurrent() -> usize {
        3
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_recent_notifications() -> usize {
        3
    }

    // Path defaults
    pub fn notified_file() -> String {
        "notified_exams.json".into()
    }
    pub fn snapshot_file() -> String {
        "exams.json".into()
    }
}
