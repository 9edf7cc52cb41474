//! # Runtime Configuration
//!
//! Unified configuration for the notification runtime.
//!
//! Loaded in three layers: built-in defaults, an optional TOML file, then
//! `NOTIFY_*` environment overrides. `validate` runs last.
//!
//! # Config File Format
//!
//! ```toml
//! [reconnect]
//! max_attempts = 5
//! initial_delay_ms = 3000
//! max_delay_ms = 60000
//! backoff_multiplier = 2.0
//!
//! [rate_limit]
//! max_requests = 20
//! window_secs = 60
//! block_secs = 120
//! sweep_interval_secs = 60
//!
//! [phone]
//! default_region = "ID"
//!
//! [storage]
//! data_dir = "./data"
//!
//! [transport]
//! auto_pair = true
//! phone_number = "6281100000000"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_dispatch::adapters::LoopbackConfig;
use notify_dispatch::domain::{region_by_tag, PhoneValidator, RateLimitConfig, ReconnectPolicy};
use notify_dispatch::DispatcherConfig;
use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// File that failed to load.
        path: String,
        /// Underlying error message.
        error: String,
    },

    /// Config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment override could not be parsed.
    #[error("Invalid value {value:?} for {key}")]
    Env {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },

    /// Values parse but do not make sense together.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Reconnect backoff.
    pub reconnect: ReconnectSection,
    /// Per-recipient throttling.
    pub rate_limit: RateLimitSection,
    /// Recipient normalization.
    pub phone: PhoneSection,
    /// On-disk locations.
    pub storage: StorageSection,
    /// Loopback transport behavior.
    pub transport: TransportSection,
}

/// Reconnect configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectSection {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor per attempt.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: millis(policy.initial_delay),
            max_delay_ms: millis(policy.max_delay),
            backoff_multiplier: policy.backoff_multiplier,
        }
    }
}

/// Rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Accepted sends per recipient per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Cooldown in seconds once the quota is exceeded.
    pub block_secs: u64,
    /// Background sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        let limits = RateLimitConfig::default();
        Self {
            max_requests: limits.max_requests,
            window_secs: limits.window.as_secs(),
            block_secs: limits.block_duration.as_secs(),
            sweep_interval_secs: limits.sweep_interval.as_secs(),
        }
    }
}

/// Phone validation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PhoneSection {
    /// Region tag used for national-format numbers.
    pub default_region: String,
}

impl Default for PhoneSection {
    fn default() -> Self {
        Self {
            default_region: PhoneValidator::default().default_region().tag.to_string(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Base directory for every file below.
    pub data_dir: PathBuf,
    /// Message log file, relative to `data_dir` unless absolute.
    pub message_log: PathBuf,
    /// Settings file, relative to `data_dir` unless absolute.
    pub settings: PathBuf,
    /// Pairing credentials file, relative to `data_dir` unless absolute.
    pub credentials: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            message_log: PathBuf::from("messages.jsonl"),
            settings: PathBuf::from("settings.json"),
            credentials: PathBuf::from("auth/credentials.json"),
        }
    }
}

impl StorageSection {
    /// Resolved message log path.
    pub fn message_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.message_log)
    }

    /// Resolved settings path.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(&self.settings)
    }

    /// Resolved credentials path.
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials)
    }
}

/// Loopback transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Complete pairing without a scan.
    pub auto_pair: bool,
    /// Number reported by the session.
    pub phone_number: Option<String>,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            auto_pair: true,
            phone_number: LoopbackConfig::default().phone_number,
        }
    }
}

impl NotifyConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `NOTIFY_*` overrides read through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `NOTIFY_DATA_DIR` | `storage.data_dir` |
    /// | `NOTIFY_DEFAULT_REGION` | `phone.default_region` |
    /// | `NOTIFY_RATE_LIMIT_MAX` | `rate_limit.max_requests` |
    /// | `NOTIFY_RECONNECT_MAX_ATTEMPTS` | `reconnect.max_attempts` |
    /// | `NOTIFY_AUTO_PAIR` | `transport.auto_pair` |
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("NOTIFY_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(region) = lookup("NOTIFY_DEFAULT_REGION") {
            self.phone.default_region = region;
        }
        if let Some(value) = lookup("NOTIFY_RATE_LIMIT_MAX") {
            self.rate_limit.max_requests = parse_env("NOTIFY_RATE_LIMIT_MAX", value)?;
        }
        if let Some(value) = lookup("NOTIFY_RECONNECT_MAX_ATTEMPTS") {
            self.reconnect.max_attempts = parse_env("NOTIFY_RECONNECT_MAX_ATTEMPTS", value)?;
        }
        if let Some(value) = lookup("NOTIFY_AUTO_PAIR") {
            self.transport.auto_pair = parse_env("NOTIFY_AUTO_PAIR", value)?;
        }
        Ok(())
    }

    /// Reject settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.reconnect;
        if r.max_attempts == 0 {
            return Err(invalid("reconnect.max_attempts must be at least 1"));
        }
        if r.initial_delay_ms > r.max_delay_ms {
            return Err(invalid("reconnect.initial_delay_ms exceeds max_delay_ms"));
        }
        if !(r.backoff_multiplier.is_finite() && r.backoff_multiplier >= 1.0) {
            return Err(invalid("reconnect.backoff_multiplier must be >= 1"));
        }

        let l = &self.rate_limit;
        if l.max_requests == 0 {
            return Err(invalid("rate_limit.max_requests must be at least 1"));
        }
        if l.window_secs == 0 || l.sweep_interval_secs == 0 {
            return Err(invalid("rate_limit windows must be non-zero"));
        }
        if l.block_secs < l.window_secs {
            return Err(invalid("rate_limit.block_secs must cover at least one window"));
        }

        if region_by_tag(&self.phone.default_region).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown phone.default_region {:?}",
                self.phone.default_region
            )));
        }

        let s = &self.storage;
        let paths = [&s.data_dir, &s.message_log, &s.settings, &s.credentials];
        if paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(invalid("storage paths must not be empty"));
        }
        Ok(())
    }

    /// Dispatcher tunables derived from this configuration.
    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, ConfigError> {
        let validator = PhoneValidator::for_region(&self.phone.default_region).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unknown phone.default_region {:?}",
                self.phone.default_region
            ))
        })?;
        Ok(DispatcherConfig {
            reconnect: ReconnectPolicy {
                max_attempts: self.reconnect.max_attempts,
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                backoff_multiplier: self.reconnect.backoff_multiplier,
            },
            rate_limit: RateLimitConfig {
                max_requests: self.rate_limit.max_requests,
                window: Duration::from_secs(self.rate_limit.window_secs),
                block_duration: Duration::from_secs(self.rate_limit.block_secs),
                sweep_interval: Duration::from_secs(self.rate_limit.sweep_interval_secs),
            },
            validator,
        })
    }

    /// Loopback transport settings.
    pub fn loopback_config(&self) -> LoopbackConfig {
        LoopbackConfig {
            phone_number: self.transport.phone_number.clone(),
            auto_pair: self.transport.auto_pair,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value,
    })
}
