//! Per-(group, identifier) suppression windows in the key-value store.

use std::{sync::Arc, time::Duration};

use dashmap::DashSet;

use crate::persistence::{error::PersistenceError, traits::KeyValueStore};

/// Namespace of cooldown markers in the key-value store.
pub const COOLDOWN_KEY_PREFIX: &str = "alert_cooldown:";

/// Tracks cooldown markers. A marker's existence is the whole signal; its
/// value is irrelevant.
///
/// Alongside the stored markers, the tracker keeps the keys of alerts that
/// are firing in this process right now, so concurrent events for one key
/// cannot all pass the store check before the first marker lands.
pub struct CooldownTracker {
    store: Arc<dyn KeyValueStore>,
    in_flight: DashSet<String>,
}

/// Exclusive hold on one cooldown key while its alert fires. Released on drop.
pub struct CooldownClaim<'a> {
    in_flight: &'a DashSet<String>,
    key: String,
}

impl Drop for CooldownClaim<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

impl CooldownTracker {
    /// Creates a tracker over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, in_flight: DashSet::new() }
    }

    /// Reserves `key` for one firing alert.
    ///
    /// Returns `None` when another alert for the same key is still in flight.
    /// Hold the claim until the marker write has finished.
    pub fn try_claim(&self, key: &str) -> Option<CooldownClaim<'_>> {
        if !self.in_flight.insert(key.to_string()) {
            return None;
        }
        Some(CooldownClaim { in_flight: &self.in_flight, key: key.to_string() })
    }

    /// The store key holding the marker for `key`.
    pub fn storage_key(key: &str) -> String {
        format!("{COOLDOWN_KEY_PREFIX}{key}")
    }

    /// Whether a marker exists for `key`. A zero window never suppresses.
    ///
    /// Store read failures are logged and reported as "not in cooldown".
    pub async fn is_in_cooldown(&self, key: &str, window: Duration) -> bool {
        if window.is_zero() {
            return false;
        }
        match self.store.get(&Self::storage_key(key)).await {
            Ok(marker) => marker.is_some(),
            Err(e) => {
                tracing::error!(
                    cooldown_key = key,
                    error = %e,
                    "Failed to read cooldown marker, treating as inactive."
                );
                false
            }
        }
    }

    /// Writes or refreshes the marker for `key`. A zero window writes nothing.
    pub async fn set_cooldown(&self, key: &str, window: Duration) -> Result<(), PersistenceError> {
        if window.is_zero() {
            return Ok(());
        }
        self.store.set_with_ttl(&Self::storage_key(key), "1", window).await?;
        tracing::debug!(cooldown_key = key, window_ms = window.as_millis() as u64, "Cooldown set.");
        Ok(())
    }
}
