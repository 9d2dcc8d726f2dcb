//! Redis implementation of [`KeyValueStore`], pooled through `deadpool-redis`.
//!
//! Keys are written as given unless a prefix is configured, in which case
//! they become `{prefix}:{key}`.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};

use crate::persistence::{error::PersistenceError, traits::KeyValueStore};

/// Increments a counter and arms its expiry only when it was just created.
const INCREMENT_SCRIPT: &str = r#"
    local value = redis.call("INCR", KEYS[1])
    if value == 1 then
        redis.call("PEXPIRE", KEYS[1], ARGV[1])
    end
    return value
"#;

/// Connection settings for [`RedisKeyValueStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g. "redis://localhost:6379").
    pub url: String,
    /// Maximum number of pooled connections.
    pub max_connections: usize,
    /// Optional namespace prepended to every key.
    pub key_prefix: Option<String>,
}

impl RedisStoreConfig {
    /// Creates a configuration for `url` with a pool of 16 connections.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), max_connections: 16, key_prefix: None }
    }

    /// Sets the maximum number of pooled connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the key namespace.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// A Redis-backed key-value store.
pub struct RedisKeyValueStore {
    pool: Pool,
    config: RedisStoreConfig,
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore")
            .field("key_prefix", &self.config.key_prefix)
            .field("max_connections", &self.config.max_connections)
            .finish()
    }
}

fn millis(ttl: Duration) -> Result<u64, PersistenceError> {
    match u64::try_from(ttl.as_millis()) {
        Ok(0) => Err(PersistenceError::InvalidInput("expiry must be greater than zero".into())),
        Ok(ms) => Ok(ms),
        Err(_) => Err(PersistenceError::InvalidInput("expiry out of range".into())),
    }
}

impl RedisKeyValueStore {
    /// Builds the pool and verifies connectivity with a `PING`.
    #[tracing::instrument(skip(config), fields(max_connections = config.max_connections), level = "info")]
    pub async fn new(config: RedisStoreConfig) -> Result<Self, PersistenceError> {
        let pool = PoolConfig::from_url(&config.url)
            .builder()
            .map_err(|e| PersistenceError::InvalidInput(format!("Invalid Redis config: {e}")))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| PersistenceError::ConnectionError(format!("Failed to build pool: {e}")))?;

        let store = Self { pool, config };
        let mut conn = store.conn().await?;
        redis::cmd("PING").query_async::<String>(&mut *conn).await?;
        tracing::info!("Connected to Redis.");
        Ok(store)
    }

    fn full_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    async fn conn(&self) -> Result<Connection, PersistenceError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let mut conn = self.conn().await?;
        let value = redis::cmd("GET")
            .arg(self.full_key(key))
            .query_async::<Option<String>>(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), PersistenceError> {
        let ms = millis(ttl)?;
        let mut conn = self.conn().await?;
        redis::cmd("PSETEX")
            .arg(self.full_key(key))
            .arg(ms)
            .arg(value)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<u64, PersistenceError> {
        let mut conn = self.conn().await?;
        let len = redis::cmd("LPUSH")
            .arg(self.full_key(key))
            .arg(value)
            .query_async::<u64>(&mut *conn)
            .await?;
        Ok(len)
    }

    async fn trim(&self, key: &str, start: i64, stop: i64) -> Result<(), PersistenceError> {
        let mut conn = self.conn().await?;
        redis::cmd("LTRIM")
            .arg(self.full_key(key))
            .arg(start)
            .arg(stop)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), PersistenceError> {
        let ms = millis(ttl)?;
        let mut conn = self.conn().await?;
        redis::cmd("PEXPIRE")
            .arg(self.full_key(key))
            .arg(ms)
            .query_async::<i64>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, PersistenceError> {
        let mut conn = self.conn().await?;
        let values = redis::cmd("LRANGE")
            .arg(self.full_key(key))
            .arg(start)
            .arg(stop)
            .query_async::<Vec<String>>(&mut *conn)
            .await?;
        Ok(values)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, PersistenceError> {
        let ms = millis(ttl)?;
        let mut conn = self.conn().await?;
        let value = redis::Script::new(INCREMENT_SCRIPT)
            .key(self.full_key(key))
            .arg(ms)
            .invoke_async::<u64>(&mut *conn)
            .await?;
        Ok(value)
    }
}
