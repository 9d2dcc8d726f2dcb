//! An in-process implementation of [`KeyValueStore`] with lazy expiry.
//!
//! Suitable for single-instance deployments and tests. Entries are evicted
//! when they are next touched after their deadline, measured against the
//! injected [`Clock`].

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    clock::{Clock, SystemClock},
    persistence::{error::PersistenceError, traits::KeyValueStore},
};

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A `DashMap`-backed key-value store.
pub struct InMemoryKeyValueStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

/// Resolves Redis-style inclusive indices against a list of length `len`.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn deadline(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, PersistenceError> {
    if ttl.is_zero() {
        return Err(PersistenceError::InvalidInput("expiry must be greater than zero".into()));
    }
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| PersistenceError::InvalidInput(format!("expiry out of range: {e}")))?;
    Ok(now + ttl)
}

impl InMemoryKeyValueStore {
    /// Creates an empty store measuring expiry against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), clock }
    }

    /// Remaining time to live of `key`, if it exists and has an expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.purge_if_expired(key, now);
        let entry = self.entries.get(key)?;
        entry.expires_at.and_then(|deadline| (deadline - now).to_std().ok())
    }

    /// Whether a live entry exists at `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.purge_if_expired(key, self.clock.now());
        self.entries.contains_key(key)
    }

    fn purge_if_expired(&self, key: &str, now: DateTime<Utc>) {
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.purge_if_expired(key, self.clock.now());
        match self.entries.get(key).map(|entry| entry.value.clone()) {
            None => Ok(None),
            Some(StoredValue::Text(text)) => Ok(Some(text)),
            Some(StoredValue::List(_)) => Err(PersistenceError::WrongType(key.to_string())),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), PersistenceError> {
        let expires_at = deadline(self.clock.now(), ttl)?;
        self.entries.insert(
            key.to_string(),
            Entry { value: StoredValue::Text(value.to_string()), expires_at: Some(expires_at) },
        );
        Ok(())
    }

    async fn push_front(&self, key: &str, value: &str) -> Result<u64, PersistenceError> {
        self.purge_if_expired(key, self.clock.now());
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry { value: StoredValue::List(VecDeque::new()), expires_at: None });
        match &mut entry.value {
            StoredValue::List(list) => {
                list.push_front(value.to_string());
                Ok(list.len() as u64)
            }
            StoredValue::Text(_) => Err(PersistenceError::WrongType(key.to_string())),
        }
    }

    async fn trim(&self, key: &str, start: i64, stop: i64) -> Result<(), PersistenceError> {
        self.purge_if_expired(key, self.clock.now());
        let now_empty = {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return Ok(());
            };
            let StoredValue::List(list) = &mut entry.value else {
                return Err(PersistenceError::WrongType(key.to_string()));
            };
            match resolve_range(list.len(), start, stop) {
                Some((from, to)) => {
                    list.truncate(to + 1);
                    list.drain(..from);
                }
                None => list.clear(),
            }
            list.is_empty()
        };
        if now_empty {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), PersistenceError> {
        let now = self.clock.now();
        let expires_at = deadline(now, ttl)?;
        self.purge_if_expired(key, now);
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, PersistenceError> {
        self.purge_if_expired(key, self.clock.now());
        let Some(entry) = self.entries.get(key) else {
            return Ok(Vec::new());
        };
        let StoredValue::List(list) = &entry.value else {
            return Err(PersistenceError::WrongType(key.to_string()));
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, PersistenceError> {
        let now = self.clock.now();
        self.purge_if_expired(key, now);
        let expires_at = deadline(now, ttl)?;
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Text("0".to_string()),
            expires_at: Some(expires_at),
        });
        let StoredValue::Text(text) = &mut entry.value else {
            return Err(PersistenceError::WrongType(key.to_string()));
        };
        let next = text
            .parse::<u64>()
            .map_err(|_| PersistenceError::WrongType(format!("{key} is not an integer")))?
            + 1;
        *text = next.to_string();
        Ok(next)
    }
}
