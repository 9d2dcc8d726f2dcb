use std::time::Duration;

use async_trait::async_trait;

use crate::persistence::{error::PersistenceError, traits::KeyValueStore};

/// A [`KeyValueStore`] whose every operation fails with a connection error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingKeyValueStore;

fn unavailable() -> PersistenceError {
    PersistenceError::ConnectionError("key-value store unavailable".into())
}

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
        Err(unavailable())
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), PersistenceError> {
        Err(unavailable())
    }

    async fn push_front(&self, _key: &str, _value: &str) -> Result<u64, PersistenceError> {
        Err(unavailable())
    }

    async fn trim(&self, _key: &str, _start: i64, _stop: i64) -> Result<(), PersistenceError> {
        Err(unavailable())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), PersistenceError> {
        Err(unavailable())
    }

    async fn range(&self, _key: &str, _start: i64, _stop: i64) -> Result<Vec<String>, PersistenceError> {
        Err(unavailable())
    }

    async fn increment(&self, _key: &str, _ttl: Duration) -> Result<u64, PersistenceError> {
        Err(unavailable())
    }
}
