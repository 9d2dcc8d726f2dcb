use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};
use crate::{
    models::channel::ChannelsConfig,
    rate_limit::{QuotaConfig, RateLimitRule},
};

/// Provides the default value for policy_cache_ttl.
fn default_policy_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

/// Provides the default value for default_cooldown.
fn default_cooldown() -> Duration {
    crate::models::policy::DEFAULT_COOLDOWN
}

/// Provides the default value for history max_entries.
fn default_history_max_entries() -> usize {
    100
}

/// Provides the default value for history retention.
fn default_history_retention() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

/// Out-of-range values in an otherwise well-formed configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// `history.max_entries` is zero.
    #[error("history.max_entries must be at least 1")]
    ZeroHistoryEntries,

    /// `history.retention_secs` is zero.
    #[error("history.retention_secs must be greater than zero")]
    ZeroHistoryRetention,

    /// A rate limit rule has a zero-length window.
    #[error("rate limit rule for '{0}' must have a window_ms greater than zero")]
    ZeroRateLimitWindow(String),
}

/// Bounds applied to the per-group alert history list.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of entries kept per group.
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,

    /// Expiry applied to the whole list key after every append.
    #[serde(
        rename = "retention_secs",
        default = "default_history_retention",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub retention: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: default_history_max_entries(), retention: default_history_retention() }
    }
}

impl HistoryConfig {
    /// Rejects bounds the key-value store cannot apply.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_entries == 0 {
            return Err(ConfigValidationError::ZeroHistoryEntries);
        }
        if self.retention.is_zero() {
            return Err(ConfigValidationError::ZeroHistoryRetention);
        }
        Ok(())
    }
}

/// Application configuration for ratewatch.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite policy store.
    pub database_url: String,

    /// Redis URL for cooldowns, history and counters. When absent an
    /// in-process store is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// How long the policy cache is served before a full reload.
    #[serde(
        rename = "policy_cache_ttl_secs",
        default = "default_policy_cache_ttl",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub policy_cache_ttl: Duration,

    /// Cooldown used by policies that do not declare one.
    #[serde(
        rename = "default_cooldown_ms",
        default = "default_cooldown",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub default_cooldown: Duration,

    /// Alert history bounds.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Notification channel configuration.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Threshold rules for the request limiter.
    #[serde(default)]
    pub rate_limits: Vec<RateLimitRule>,

    /// Daily call limits per subscription tier.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Path to the static default policies file.
    #[serde(skip_deserializing)]
    pub default_policies_path: PathBuf,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `RATEWATCH__*` environment overrides.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("RATEWATCH").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.validate().map_err(|e| ConfigError::Message(e.to_string()))?;

        config.default_policies_path = Path::new(config_dir_str).join("policies.yaml");

        Ok(config)
    }

    /// Checks the history bounds and every rate limit rule.
    ///
    /// # Returns
    ///
    /// The first out-of-range value found, if any. Channel settings are
    /// checked separately by [`ChannelsConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.history.validate()?;
        self.rate_limits.iter().try_for_each(RateLimitRule::validate)
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self {
            config: AppConfig {
                database_url: "sqlite::memory:".to_string(),
                redis_url: None,
                policy_cache_ttl: default_policy_cache_ttl(),
                default_cooldown: default_cooldown(),
                history: HistoryConfig::default(),
                channels: ChannelsConfig::default(),
                rate_limits: Vec::new(),
                quota: QuotaConfig::default(),
                default_policies_path: PathBuf::from("configs/policies.yaml"),
            },
        }
    }
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn redis_url(mut self, url: &str) -> Self {
        self.config.redis_url = Some(url.to_string());
        self
    }

    pub fn policy_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.policy_cache_ttl = ttl;
        self
    }

    pub fn channels(mut self, channels: ChannelsConfig) -> Self {
        self.config.channels = channels;
        self
    }

    pub fn rate_limits(mut self, rules: Vec<RateLimitRule>) -> Self {
        self.config.rate_limits = rules;
        self
    }

    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    pub fn default_policies_path(mut self, path: PathBuf) -> Self {
        self.config.default_policies_path = path;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
