//! Runner configuration
//!
//! Defaults, then an optional JSON file, then environment overrides.

use geotrackr_session::SessionConfig;
use geotrackr_sync::{DEFAULT_CAPACITY, SyncConfig, Topics};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_STREAM_URL: &str = "GEOTRACKR_STREAM_URL";
pub const ENV_API_URL: &str = "GEOTRACKR_API_URL";
pub const ENV_TOKEN: &str = "GEOTRACKR_TOKEN";
pub const ENV_HEARTBEAT_MS: &str = "GEOTRACKR_HEARTBEAT_MS";
pub const ENV_RECONNECT_DELAY_MS: &str = "GEOTRACKR_RECONNECT_DELAY_MS";
pub const ENV_UPGRADE_TIMEOUT_MS: &str = "GEOTRACKR_UPGRADE_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "GEOTRACKR_POLL_INTERVAL_MS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
    #[error("{var} must be a number of milliseconds, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// SockJS endpoint of the stream
    pub stream_url: String,
    /// Base of the REST API; the asset list is `{api_url}/assets`
    pub api_url: String,
    pub token: Option<String>,
    /// Used for both heart-beat directions, 0 disables
    pub heartbeat_ms: u64,
    pub reconnect_delay_ms: u64,
    pub upgrade_timeout_ms: u64,
    /// Periodic snapshot refresh, 0 disables
    pub poll_interval_ms: u64,
    pub buffer_capacity: usize,
    pub topics: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            stream_url: "http://localhost:8080/ws/location".to_string(),
            api_url: "http://localhost:8080/api".to_string(),
            token: None,
            heartbeat_ms: 10_000,
            reconnect_delay_ms: 5_000,
            upgrade_timeout_ms: 5_000,
            poll_interval_ms: 5_000,
            buffer_capacity: DEFAULT_CAPACITY,
            topics: Topics::defaults(),
        }
    }
}

/// Load configuration from a JSON file; missing fields take defaults
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunnerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(json: &str) -> Result<RunnerConfig, ConfigError> {
    let config: RunnerConfig = serde_json::from_str(json)?;
    Ok(config)
}

fn parse_ms(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { var, value })
}

impl RunnerConfig {
    /// Apply `GEOTRACKR_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_STREAM_URL) {
            self.stream_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(value) = lookup(ENV_HEARTBEAT_MS) {
            self.heartbeat_ms = parse_ms(ENV_HEARTBEAT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_RECONNECT_DELAY_MS) {
            self.reconnect_delay_ms = parse_ms(ENV_RECONNECT_DELAY_MS, value)?;
        }
        if let Some(value) = lookup(ENV_UPGRADE_TIMEOUT_MS) {
            self.upgrade_timeout_ms = parse_ms(ENV_UPGRADE_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_ms(ENV_POLL_INTERVAL_MS, value)?;
        }
        Ok(self)
    }

    pub fn stream_endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.stream_url).map_err(|source| ConfigError::InvalidUrl {
            field: "stream_url",
            source,
        })
    }

    pub fn api_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_url).map_err(|source| ConfigError::InvalidUrl {
            field: "api_url",
            source,
        })
    }

    pub fn upgrade_timeout(&self) -> Duration {
        Duration::from_millis(self.upgrade_timeout_ms)
    }

    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        let heartbeat = Duration::from_millis(self.heartbeat_ms);
        let mut session = SessionConfig::new(self.stream_endpoint()?)
            .with_heartbeat(heartbeat, heartbeat)
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms));
        if let Some(token) = &self.token {
            session = session.with_bearer_token(token);
        }

        let mut config = SyncConfig::new(session)
            .with_topics(self.topics.clone())
            .with_buffer_capacity(self.buffer_capacity);
        if self.poll_interval_ms > 0 {
            config = config.with_poll_interval(Duration::from_millis(self.poll_interval_ms));
        }
        Ok(config)
    }
}
