//! Fixed-window request limiter that raises an alert when a caller first
//! crosses its threshold.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    config::{ConfigValidationError, deserialize_duration_from_ms},
    engine::AlertEngine,
    models::{AlertEvent, Severity},
    persistence::traits::KeyValueStore,
};

/// Namespace of limiter counters in the key-value store.
pub const RATE_LIMIT_KEY_PREFIX: &str = "rate_limit:";

/// A threshold for one route group.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RateLimitRule {
    /// The route group the rule applies to. Also the alert group.
    pub group: String,
    /// Requests allowed per window.
    pub max_requests: u64,
    /// Window length.
    #[serde(rename = "window_ms", deserialize_with = "deserialize_duration_from_ms")]
    pub window: Duration,
    /// Severity suggested on the emitted alert.
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl RateLimitRule {
    /// Creates a rule.
    pub fn new(group: impl Into<String>, max_requests: u64, window: Duration) -> Self {
        Self { group: group.into(), max_requests, window, severity: None }
    }

    /// Rejects a zero-length window, which no counter could expire.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.window.is_zero() {
            return Err(ConfigValidationError::ZeroRateLimitWindow(self.group.clone()));
        }
        Ok(())
    }
}

/// Request details copied onto the alert event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request path.
    pub path: Option<String>,
    /// Request method.
    pub method: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
}

/// The limiter's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Requests seen in the current window, this one included.
    pub count: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Upper bound on the wait before the window resets, when rejected.
    pub retry_after: Option<Duration>,
}

/// Counts requests per `(group, identifier)` in fixed windows.
pub struct ThresholdLimiter {
    rules: HashMap<String, RateLimitRule>,
    store: Arc<dyn KeyValueStore>,
    alerts: Option<Arc<AlertEngine>>,
}

impl ThresholdLimiter {
    /// Creates a limiter. When `alerts` is set, crossing a threshold sends
    /// one alert per window through it.
    pub fn new(
        rules: Vec<RateLimitRule>,
        store: Arc<dyn KeyValueStore>,
        alerts: Option<Arc<AlertEngine>>,
    ) -> Self {
        let rules = rules.into_iter().map(|r| (r.group.clone(), r)).collect();
        Self { rules, store, alerts }
    }

    /// The rule for `group`, if any.
    pub fn rule(&self, group: &str) -> Option<&RateLimitRule> {
        self.rules.get(group)
    }

    /// Counts one request. Returns `None` when no rule covers `group`.
    ///
    /// Store failures fail open: the request is allowed and no alert is sent.
    pub async fn check(
        &self,
        group: &str,
        identifier: &str,
        context: &RequestContext,
    ) -> Option<RateLimitDecision> {
        let rule = self.rules.get(group)?;
        let key = format!("{RATE_LIMIT_KEY_PREFIX}{group}:{identifier}");

        let count = match self.store.increment(&key, rule.window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(group, identifier, error = %e, "Rate limit check failed, allowing request.");
                return Some(RateLimitDecision {
                    allowed: true,
                    count: 0,
                    remaining: rule.max_requests,
                    retry_after: None,
                });
            }
        };

        let allowed = count <= rule.max_requests;
        if count == rule.max_requests + 1 {
            self.raise_alert(rule, identifier, count, context);
        }

        Some(RateLimitDecision {
            allowed,
            count,
            remaining: rule.max_requests.saturating_sub(count),
            retry_after: (!allowed).then_some(rule.window),
        })
    }

    fn raise_alert(&self, rule: &RateLimitRule, identifier: &str, count: u64, context: &RequestContext) {
        tracing::warn!(group = %rule.group, identifier, count, "Rate limit threshold exceeded.");
        let Some(engine) = &self.alerts else {
            return;
        };
        let mut event = AlertEvent::new(rule.group.clone(), identifier, count);
        event.path = context.path.clone();
        event.method = context.method.clone();
        event.user_agent = context.user_agent.clone();
        event.severity = rule.severity;
        engine.send_alert_detached(event);
    }
}
