//! Configuration for the comms view.
//!
//! Layered as: built-in defaults, then the TOML file, then environment
//! variables, then command-line flags (applied by the binary).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wws_comms_protocol::EVENT_BUFFER_CAPACITY;

use crate::ViewError;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WWS_COMMS_CONFIG";
/// Environment override for the kernel base URL.
pub const BASE_URL_ENV: &str = "WWS_COMMS_URL";
/// Environment override for the stream access token.
pub const TOKEN_ENV: &str = "WWS_COMMS_TOKEN";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4200";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Base address of the kernel API, without a trailing path.
    pub base_url: String,
    /// Access token appended to the stream URL.
    pub token: Option<String>,
    /// Size of the initial event page.
    pub event_limit: usize,
    /// Timeout for snapshot fetches and user actions. The stream has none.
    pub request_timeout_secs: u64,
    /// Console redraw interval.
    pub tick_ms: u64,
    /// Directory for the log file. Defaults to the platform data dir.
    pub log_dir: Option<PathBuf>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            event_limit: EVENT_BUFFER_CAPACITY,
            request_timeout_secs: 10,
            tick_ms: 100,
            log_dir: None,
        }
    }
}

impl ViewConfig {
    /// Default config file location: `<config_dir>/wws/comms.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("wws").join("comms.toml"))
    }

    /// Load from `path` if given (it must exist), otherwise from
    /// `$WWS_COMMS_CONFIG` or the default location when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ViewError> {
        if let Some(p) = path {
            return Self::from_file(p);
        }
        let candidate = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(Self::default_path);
        match candidate {
            Some(p) if p.exists() => Self::from_file(&p),
            Some(p) => {
                tracing::debug!(path = %p.display(), "No config file found; using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ViewError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ViewError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&raw)
            .map_err(|e| ViewError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Loaded comms view config");
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ViewError> {
        toml::from_str(raw).map_err(|e| ViewError::Config(e.to_string()))
    }

    /// Apply `WWS_COMMS_URL` / `WWS_COMMS_TOKEN` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|s| !s.is_empty()) {
            self.base_url = url;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|s| !s.is_empty()) {
            self.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| ViewError::Config(format!("base_url '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ViewError::Config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.event_limit == 0 {
            return Err(ViewError::Config("event_limit must be at least 1".into()));
        }
        if self.tick_ms == 0 {
            return Err(ViewError::Config("tick_ms must be at least 1".into()));
        }
        Ok(())
    }

    /// Event page size, capped at the feed capacity.
    pub fn effective_event_limit(&self) -> usize {
        self.event_limit.clamp(1, EVENT_BUFFER_CAPACITY)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Where the console writes its log file.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wws")
        })
    }
}
