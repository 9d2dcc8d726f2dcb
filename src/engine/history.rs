//! Bounded, expiring per-group log of fired alerts.

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::HistoryConfig,
    models::AlertEvent,
    persistence::{error::PersistenceError, traits::KeyValueStore},
};

/// Namespace of history lists in the key-value store.
pub const HISTORY_KEY_PREFIX: &str = "alert_history:";

/// Records fired alerts, newest first. Never fails outward.
pub struct HistoryRecorder {
    store: Arc<dyn KeyValueStore>,
    config: HistoryConfig,
    clock: Arc<dyn Clock>,
}

impl HistoryRecorder {
    /// Creates a recorder bounded by `config`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: HistoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self { store, config, clock }
    }

    /// The store key holding the history of `group`.
    pub fn storage_key(group: &str) -> String {
        format!("{HISTORY_KEY_PREFIX}{group}")
    }

    /// Appends `event`, with its timestamp resolved, to the history of `group`.
    pub async fn append(&self, group: &str, event: &AlertEvent) {
        if let Err(e) = self.try_append(group, event).await {
            tracing::error!(
                group,
                identifier = %event.identifier,
                error = %e,
                "Failed to record alert history."
            );
        }
    }

    async fn try_append(&self, group: &str, event: &AlertEvent) -> Result<(), PersistenceError> {
        let entry = serde_json::to_string(&event.resolved(self.clock.now()))
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let key = Self::storage_key(group);
        let max_index = self.config.max_entries.saturating_sub(1) as i64;

        self.store.push_front(&key, &entry).await?;
        self.store.trim(&key, 0, max_index).await?;
        self.store.expire(&key, self.config.retention).await?;
        Ok(())
    }

    /// Returns up to `limit` entries for `group`, newest first. Empty on
    /// failure; entries that no longer parse are skipped.
    pub async fn list(&self, group: &str, limit: usize) -> Vec<AlertEvent> {
        if limit == 0 {
            return Vec::new();
        }
        let stop = (limit - 1).min(i64::MAX as usize) as i64;
        match self.store.range(&Self::storage_key(group), 0, stop).await {
            Ok(entries) => entries
                .iter()
                .filter_map(|raw| match serde_json::from_str::<AlertEvent>(raw) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::warn!(group, error = %e, "Skipping unreadable history entry.");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::error!(group, error = %e, "Failed to read alert history.");
                Vec::new()
            }
        }
    }
}
