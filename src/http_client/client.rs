//! Retrying HTTP client construction shared by the webhook and SMS channels.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{Jitter, RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{HttpRetryConfig, JitterSetting};

/// Timeouts applied to every outbound channel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Time allowed to establish a connection.
    pub connect: Duration,
    /// Time allowed for a whole request, including the response body.
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { connect: Duration::from_secs(10), request: Duration::from_secs(30) }
    }
}

/// Wraps `base_client` with transient-error retries following `config`.
///
/// # Arguments
/// * `config` - Retry count, backoff bounds and jitter.
/// * `base_client` - The `reqwest::Client` doing the actual I/O. Its
///   connection pool and timeouts are kept.
///
/// # Returns
/// * `ClientWithMiddleware` - A client that retries transient failures with
///   exponential backoff.
pub fn create_retryable_http_client(
    config: &HttpRetryConfig,
    base_client: reqwest::Client,
) -> ClientWithMiddleware {
    let jitter = match config.jitter {
        JitterSetting::None => Jitter::None,
        JitterSetting::Full => Jitter::Full,
    };
    let retry_policy = ExponentialBackoff::builder()
        .jitter(jitter)
        .base(config.base_for_backoff)
        .retry_bounds(config.initial_backoff_ms, config.max_backoff_secs)
        .build_with_max_retries(config.max_retries);

    ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// Builds the plain `reqwest` client underneath the retry middleware.
pub(crate) fn build_base_client(timeouts: HttpTimeouts) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .build()
}
