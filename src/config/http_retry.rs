//! Retry policy shared by the HTTP-backed notification channels.
//!
//! Each of the Slack, Teams and SMS channel configs carries an optional
//! `retry_policy` section. Omitted fields fall back to the defaults below:
//! three retries, exponential backoff from 250ms doubling up to 10s, with
//! full jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};

/// --- Default values for retry configuration settings ---
fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> Duration {
    Duration::from_millis(250)
}

fn default_max_backoff_secs() -> Duration {
    Duration::from_secs(10)
}

fn default_base_for_backoff() -> u32 {
    2
}

/// Serializable setting for jitter in retry policies
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// No jitter applied to the backoff duration
    None,
    /// Full jitter applied, randomizing the backoff duration
    #[default]
    Full,
}

/// Retry policy for outbound HTTP channels (chat webhooks, SMS API).
///
/// The policy is applied by `reqwest-retry` middleware, so only transient
/// failures (connection errors, timeouts, 5xx and 429 responses) are retried.
/// It also keys the shared client pool, which is why it is `Hash` and `Eq`.
///
/// ```yaml
/// retry_policy:
///   max_retries: 5
///   initial_backoff_ms: 500
///   max_backoff_secs: 30
///   jitter: none
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HttpRetryConfig {
    /// Maximum number of retries for transient errors. `0` sends each
    /// request exactly once.
    #[serde(default = "default_max_attempts")]
    pub max_retries: u32,
    /// Multiplier applied to the backoff after each attempt
    #[serde(default = "default_base_for_backoff")]
    pub base_for_backoff: u32,
    /// Initial backoff duration before the first retry
    #[serde(
        default = "default_initial_backoff_ms",
        deserialize_with = "deserialize_duration_from_ms",
        serialize_with = "serialize_duration_to_ms"
    )]
    pub initial_backoff_ms: Duration,
    /// Maximum backoff duration for retries
    #[serde(
        default = "default_max_backoff_secs",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub max_backoff_secs: Duration,
    /// Jitter to apply to the backoff duration
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_attempts(),
            base_for_backoff: default_base_for_backoff(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            jitter: JitterSetting::default(),
        }
    }
}
