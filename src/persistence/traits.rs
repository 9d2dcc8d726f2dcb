//! Storage interfaces consumed by the alert engine.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{models::AlertPolicy, persistence::error::PersistenceError};

/// A fast key-value store with native expiry, used for cooldown markers,
/// alert history lists and rate-limit counters.
///
/// List index arguments follow Redis semantics: both ends are inclusive and
/// negative indices count from the tail (`-1` is the last element).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the string value stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Stores `value` at `key`, replacing any previous value and expiry.
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), PersistenceError>;

    /// Prepends `value` to the list at `key`, creating it if needed.
    /// Returns the new list length.
    async fn push_front(&self, key: &str, value: &str) -> Result<u64, PersistenceError>;

    /// Keeps only the elements between `start` and `stop`.
    async fn trim(&self, key: &str, start: i64, stop: i64) -> Result<(), PersistenceError>;

    /// Sets the expiry of `key`. Missing keys are ignored.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), PersistenceError>;

    /// Returns the list elements between `start` and `stop`.
    async fn range(&self, key: &str, start: i64, stop: i64)
    -> Result<Vec<String>, PersistenceError>;

    /// Atomically increments the counter at `key` and returns the new value.
    /// `ttl` is applied only when the counter is created.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, PersistenceError>;
}

/// The relational source of truth for alert policies.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fetches every enabled policy.
    async fn fetch_enabled_policies(&self) -> Result<Vec<AlertPolicy>, PersistenceError>;
}
