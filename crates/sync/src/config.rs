// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Host configuration.
//!
//! Read from `$XDG_CONFIG_HOME/issync/config.toml` unless a path is given.
//! Every field has a default, so an absent file is a valid configuration.
//!
//! ```toml
//! token = "..."              # or ISSYNC_TOKEN
//! log_file = "/tmp/issync.log"
//!
//! [remote]
//! base_url = "https://issues.example.com"
//! live_url = "wss://issues.example.com"   # derived from base_url when absent
//!
//! [cache]
//! path = "/var/lib/issync/cache.db"
//!
//! [sync]
//! retry_initial_delay_ms = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::LiveConfig;

const APP_DIR_NAME: &str = "issync";
const CONFIG_FILE_NAME: &str = "config.toml";
const CACHE_FILE_NAME: &str = "cache.db";

/// Environment variable holding the bearer token.
pub const TOKEN_ENV: &str = "ISSYNC_TOKEN";

/// Complete host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Write logs here instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Bearer token. `ISSYNC_TOKEN` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// The issue service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Root of the REST API (http or https).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Push endpoint (ws or wss). Derived from `base_url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Live channel attempts before giving up (default: 10, 0 = unlimited).
    #[serde(default = "default_reconnect_max_retries")]
    pub reconnect_max_retries: u32,
    /// First live channel retry delay in milliseconds (default: 100).
    #[serde(default = "default_reconnect_initial_delay_ms")]
    pub reconnect_initial_delay_ms: u64,
    /// Cap on the live channel retry delay in seconds (default: 30).
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_reconnect_max_retries() -> u32 {
    10
}

fn default_reconnect_initial_delay_ms() -> u64 {
    100
}

fn default_reconnect_max_delay_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            live_url: None,
            timeout_secs: default_timeout_secs(),
            reconnect_max_retries: default_reconnect_max_retries(),
            reconnect_initial_delay_ms: default_reconnect_initial_delay_ms(),
            reconnect_max_delay_secs: default_reconnect_max_delay_secs(),
        }
    }
}

impl RemoteConfig {
    /// The push endpoint: `live_url`, or `base_url` with its scheme swapped
    /// (`http` → `ws`, `https` → `wss`).
    pub fn live_url(&self) -> String {
        if let Some(url) = &self.live_url {
            return url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Settings for the live channel.
    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            url: self.live_url(),
            max_retries: self.reconnect_max_retries,
            initial_delay_ms: self.reconnect_initial_delay_ms,
            max_delay_secs: self.reconnect_max_delay_secs,
        }
    }

    fn validate(&self) -> Result<()> {
        check_scheme("remote.base_url", &self.base_url, &["http", "https"])?;
        check_scheme("remote.live_url", &self.live_url(), &["ws", "wss"])
    }
}

fn check_scheme(field: &str, url: &str, allowed: &[&str]) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Config(format!("invalid {} '{}': {}", field, url, e)))?;
    if !allowed.contains(&parsed.scheme()) {
        return Err(Error::Config(format!(
            "invalid {} '{}': scheme must be one of {}",
            field,
            url,
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// The durable cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file. Defaults to `$XDG_DATA_HOME/issync/cache.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CACHE_FILE_NAME))
            .ok_or_else(|| Error::Config("cannot determine data directory; set cache.path".into()))
    }
}

/// Reachability probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Interval between probes in milliseconds (default: 5000).
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Probe connect timeout in milliseconds (default: 2000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_interval_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Synchronizer behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Refetch page 1 whenever the remote becomes reachable (default: true).
    #[serde(default = "default_refresh_on_reconnect")]
    pub refresh_on_reconnect: bool,
    /// Capacity of the synchronizer's command queue (default: 64).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// First delay before replaying work that failed in transit, in
    /// milliseconds (default: 1000). Doubles on every failed retry.
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    /// Cap on the replay retry delay in seconds (default: 60).
    #[serde(default = "default_retry_max_delay_secs")]
    pub retry_max_delay_secs: u64,
}

fn default_refresh_on_reconnect() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    64
}

fn default_retry_initial_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_secs() -> u64 {
    60
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_on_reconnect: default_refresh_on_reconnect(),
            queue_capacity: default_queue_capacity(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_secs: default_retry_max_delay_secs(),
        }
    }
}

impl SyncConfig {
    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    /// Never below the initial delay.
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_secs(self.retry_max_delay_secs).max(self.retry_initial_delay())
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/issync/config.toml`, if a config directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Parses and validates a TOML document.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at `path`, which must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Loads `path` if given; otherwise the default file, or defaults if it
    /// does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;
        if self.sync.queue_capacity == 0 {
            return Err(Error::Config("sync.queue_capacity must be positive".into()));
        }
        if self.sync.retry_initial_delay_ms == 0 {
            return Err(Error::Config(
                "sync.retry_initial_delay_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The bearer token: `ISSYNC_TOKEN`, else the `token` key.
    pub fn token(&self) -> Option<String> {
        self.token_with_env(std::env::var(TOKEN_ENV).ok())
    }

    /// Empty strings count as absent on both sides.
    pub fn token_with_env(&self, env: Option<String>) -> Option<String> {
        env.filter(|t| !t.is_empty())
            .or_else(|| self.token.clone().filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
