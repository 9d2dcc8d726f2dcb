//! Time-boxed, whole-map cache over the policy store.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    clock::Clock,
    models::AlertPolicy,
    persistence::{error::PersistenceError, traits::PolicyStore},
};

#[derive(Default)]
struct CacheState {
    policies: HashMap<String, AlertPolicy>,
    last_refreshed: Option<DateTime<Utc>>,
}

/// Caches every enabled policy and reloads them all once `ttl` has passed.
///
/// Groups missing from the store fall back to the static defaults supplied at
/// construction. A failing store never surfaces to callers: the failure is
/// logged and the static default (or nothing) is served instead.
pub struct PolicyCache {
    store: Arc<dyn PolicyStore>,
    defaults: HashMap<String, AlertPolicy>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
}

impl PolicyCache {
    /// Creates an empty cache. The first lookup triggers a refresh.
    pub fn new(
        store: Arc<dyn PolicyStore>,
        defaults: Vec<AlertPolicy>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let defaults = defaults.into_iter().map(|p| (p.route_group.clone(), p)).collect();
        Self { store, defaults, ttl, clock, state: RwLock::new(CacheState::default()) }
    }

    /// Resolves the policy for `group`.
    pub async fn get_policy(&self, group: &str) -> Option<AlertPolicy> {
        if self.is_stale().await
            && let Err(e) = self.refresh().await
        {
            tracing::error!(group, error = %e, "Failed to refresh policy cache.");
            return self.fallback(group);
        }

        if let Some(policy) = self.state.read().await.policies.get(group) {
            return Some(policy.clone());
        }
        self.fallback(group)
    }

    /// Reloads every enabled policy and replaces the cached map wholesale.
    /// Returns the number of policies loaded.
    pub async fn refresh(&self) -> Result<usize, PersistenceError> {
        // The store is queried without holding the lock; concurrent refreshes
        // are allowed and the last one to finish wins.
        let policies = self.store.fetch_enabled_policies().await?;
        let policies: HashMap<_, _> =
            policies.into_iter().map(|p| (p.route_group.clone(), p)).collect();
        let count = policies.len();

        let mut state = self.state.write().await;
        state.policies = policies;
        state.last_refreshed = Some(self.clock.now());
        tracing::info!(count, "Policy cache refreshed.");
        Ok(count)
    }

    /// Marks the cache stale so the next lookup reloads it.
    pub async fn invalidate(&self) {
        self.state.write().await.last_refreshed = None;
    }

    /// When the cache was last reloaded successfully.
    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_refreshed
    }

    /// Number of cached policies.
    pub async fn len(&self) -> usize {
        self.state.read().await.policies.len()
    }

    /// Whether the cache holds no policies.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.policies.is_empty()
    }

    async fn is_stale(&self) -> bool {
        match self.state.read().await.last_refreshed {
            None => true,
            Some(at) => match (self.clock.now() - at).to_std() {
                Ok(age) => age >= self.ttl,
                // The clock moved backwards.
                Err(_) => true,
            },
        }
    }

    fn fallback(&self, group: &str) -> Option<AlertPolicy> {
        let policy = self.defaults.get(group).cloned();
        if policy.is_some() {
            tracing::warn!(group, "Using static default policy.");
        }
        policy
    }
}
