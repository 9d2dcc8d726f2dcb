//! A reusable, thread-safe pool of retrying HTTP clients.
//!
//! The Slack, Teams and SMS channels each carry their own retry policy. The
//! pool builds one client per distinct policy and hands the same client to
//! every channel that asks with an equal policy.

use std::{collections::HashMap, sync::Arc};

use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::{HttpTimeouts, build_base_client, create_retryable_http_client};
use crate::config::HttpRetryConfig;

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// A pool for managing and reusing HTTP clients across notification channels.
///
/// Clients are keyed by their [`HttpRetryConfig`], so channels with equal
/// retry policies share one client and its connection pool, while different
/// retry strategies get isolated clients. Every client is built with the
/// pool's [`HttpTimeouts`].
pub struct HttpClientPool {
    timeouts: HttpTimeouts,
    clients: RwLock<HashMap<HttpRetryConfig, Arc<ClientWithMiddleware>>>,
}

impl HttpClientPool {
    /// Creates an empty pool with default timeouts.
    pub fn new() -> Self {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates an empty pool whose clients use `timeouts`.
    ///
    /// # Arguments
    /// * `timeouts` - Connect and request timeouts applied to every client the
    ///   pool builds.
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Self {
        Self { timeouts, clients: RwLock::new(HashMap::new()) }
    }

    /// Gets the client for `retry_policy`, or builds one if none exists yet.
    ///
    /// Only one client per distinct policy is ever built. Lookups take the read
    /// lock; a miss takes the write lock and checks again before building.
    ///
    /// # Arguments
    /// * `retry_policy` - Retry policy of the calling channel. Used as the key
    ///   of the client in the pool.
    ///
    /// # Returns
    /// * `Result<Arc<ClientWithMiddleware>, HttpClientPoolError>` - The shared
    ///   client, or an error if the underlying `reqwest::Client` cannot be built.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        if let Some(client) = self.clients.read().await.get(retry_policy) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        // Another task may have won the race for the write lock.
        if let Some(client) = clients.get(retry_policy) {
            return Ok(client.clone());
        }

        let base_client = build_base_client(self.timeouts)
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;
        let client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(retry_policy.clone(), client.clone());
        tracing::debug!(max_retries = retry_policy.max_retries, "Created HTTP client.");

        Ok(client)
    }

    /// Number of distinct clients built so far.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether no client has been built yet.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_policy_shares_a_client() {
        let pool = HttpClientPool::new();
        assert!(pool.is_empty().await);

        let first = pool.get_or_create(&HttpRetryConfig::default()).await.unwrap();
        let second = pool.get_or_create(&HttpRetryConfig::default()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_policies_get_distinct_clients() {
        let pool = HttpClientPool::new();
        let patient = HttpRetryConfig { max_retries: 5, ..Default::default() };

        let first = pool.get_or_create(&HttpRetryConfig::default()).await.unwrap();
        let second = pool.get_or_create(&patient).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_build_one_client() {
        let pool = Arc::new(HttpClientPool::new());
        let tasks = (0..10).map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get_or_create(&HttpRetryConfig::default()).await })
        });

        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(pool.len().await, 1);
    }
}
