//! Daily call quotas per subscription tier, reset at midnight UTC.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    clock::Clock,
    persistence::{error::PersistenceError, traits::KeyValueStore},
};

/// Namespace of quota counters in the key-value store.
pub const QUOTA_KEY_PREFIX: &str = "quota:";

/// A subscription plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Free plan.
    #[default]
    Free,
    /// Pro plan.
    Pro,
    /// Business plan.
    Business,
    /// Enterprise plan.
    Enterprise,
}

impl SubscriptionTier {
    /// Returns the lowercase tier name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Business => "business",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "pro" => Ok(SubscriptionTier::Pro),
            "business" => Ok(SubscriptionTier::Business),
            "enterprise" => Ok(SubscriptionTier::Enterprise),
            other => Err(format!("unknown subscription tier '{other}'")),
        }
    }
}

fn default_free() -> u64 {
    50
}

fn default_pro() -> u64 {
    1_000
}

fn default_business() -> u64 {
    5_000
}

fn default_enterprise() -> u64 {
    25_000
}

/// Daily call limits per tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuotaConfig {
    /// Free tier limit.
    #[serde(default = "default_free")]
    pub free: u64,
    /// Pro tier limit.
    #[serde(default = "default_pro")]
    pub pro: u64,
    /// Business tier limit.
    #[serde(default = "default_business")]
    pub business: u64,
    /// Enterprise tier limit.
    #[serde(default = "default_enterprise")]
    pub enterprise: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free: default_free(),
            pro: default_pro(),
            business: default_business(),
            enterprise: default_enterprise(),
        }
    }
}

impl QuotaConfig {
    /// The daily limit of `tier`.
    pub fn limit_for(&self, tier: SubscriptionTier) -> u64 {
        match tier {
            SubscriptionTier::Free => self.free,
            SubscriptionTier::Pro => self.pro,
            SubscriptionTier::Business => self.business,
            SubscriptionTier::Enterprise => self.enterprise,
        }
    }
}

/// A user's standing against their daily quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    /// Whether the call may proceed.
    pub allowed: bool,
    /// Calls counted today.
    pub calls_today: u64,
    /// Calls left today.
    pub remaining: u64,
    /// The applicable daily limit.
    pub limit: u64,
    /// Next midnight UTC.
    pub resets_at: DateTime<Utc>,
}

/// Enforces [`QuotaConfig`] with one counter per user per UTC day.
pub struct DailyQuota {
    store: Arc<dyn KeyValueStore>,
    config: QuotaConfig,
    clock: Arc<dyn Clock>,
}

fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive().checked_add_days(Days::new(1)).unwrap_or(now.date_naive());
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

impl DailyQuota {
    /// Creates a quota over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: QuotaConfig, clock: Arc<dyn Clock>) -> Self {
        Self { store, config, clock }
    }

    fn key(user_id: &str, now: DateTime<Utc>) -> String {
        format!("{QUOTA_KEY_PREFIX}{user_id}:{}", now.format("%Y-%m-%d"))
    }

    /// Counts one call for `user_id` unless the limit is already reached.
    ///
    /// Store failures fail open with the free-tier figures.
    pub async fn check_and_consume(&self, user_id: &str, tier: SubscriptionTier) -> QuotaStatus {
        let now = self.clock.now();
        let resets_at = next_midnight(now);
        let limit = self.config.limit_for(tier);

        match self.try_consume(user_id, limit, now, resets_at).await {
            Ok((allowed, calls_today)) => QuotaStatus {
                allowed,
                calls_today,
                remaining: limit.saturating_sub(calls_today),
                limit,
                resets_at,
            },
            Err(e) => {
                tracing::error!(user_id, tier = %tier, error = %e, "Quota check failed, allowing request.");
                let free = self.config.free;
                QuotaStatus { allowed: true, calls_today: 0, remaining: free, limit: free, resets_at }
            }
        }
    }

    async fn try_consume(
        &self,
        user_id: &str,
        limit: u64,
        now: DateTime<Utc>,
        resets_at: DateTime<Utc>,
    ) -> Result<(bool, u64), PersistenceError> {
        let key = Self::key(user_id, now);
        let used = self.counter(&key).await?;
        if used >= limit {
            return Ok((false, used.min(limit)));
        }

        let ttl = (resets_at - now).to_std().unwrap_or(Duration::from_secs(1)).max(Duration::from_millis(1));
        let count = self.store.increment(&key, ttl).await?;
        // Concurrent callers may overshoot the limit by a few; they are rejected.
        if count > limit {
            return Ok((false, limit));
        }
        Ok((true, count))
    }

    /// Reports today's usage without counting a call.
    pub async fn usage(&self, user_id: &str, tier: SubscriptionTier) -> Result<QuotaStatus, PersistenceError> {
        let now = self.clock.now();
        let limit = self.config.limit_for(tier);
        let used = self.counter(&Self::key(user_id, now)).await?.min(limit);
        Ok(QuotaStatus {
            allowed: used < limit,
            calls_today: used,
            remaining: limit - used,
            limit,
            resets_at: next_midnight(now),
        })
    }

    async fn counter(&self, key: &str) -> Result<u64, PersistenceError> {
        match self.store.get(key).await? {
            None => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|_| PersistenceError::SerializationError(format!("{key} is not a counter"))),
        }
    }
}
