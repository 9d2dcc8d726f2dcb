//! Interfaces implemented by notification channels and error trackers.

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::{
    channels::error::ChannelError,
    models::{AlertEvent, AlertPolicy, CaptureLevel, ChannelKind},
};

/// A channel that delivers an alert asynchronously.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Delivers `event` according to `policy`.
    async fn send(&self, event: &AlertEvent, policy: &AlertPolicy) -> Result<(), ChannelError>;
}

/// A synchronous, fire-and-forget error-tracking sink.
#[cfg_attr(test, automock)]
pub trait ErrorTracker: Send + Sync {
    /// Records `report`. Must not block on network I/O.
    fn capture(&self, report: CaptureReport);
}

/// A single error-tracking event.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    /// Human readable summary.
    pub message: String,
    /// Priority of the event.
    pub level: CaptureLevel,
    /// Indexed key/value labels.
    pub tags: BTreeMap<String, String>,
    /// Arbitrary structured context.
    pub extra: Value,
}

impl CaptureReport {
    /// Creates a report without tags or extra context.
    pub fn new(message: impl Into<String>, level: CaptureLevel) -> Self {
        Self { message: message.into(), level, tags: BTreeMap::new(), extra: Value::Null }
    }

    /// Adds a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the extra context.
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = extra;
        self
    }

    /// The capture sent when a policy routes an alert to error tracking.
    pub fn rate_limit_alert(event: &AlertEvent, policy: &AlertPolicy) -> Self {
        Self::new("Rate limit threshold exceeded", policy.severity.capture_level())
            .with_tag("type", "security")
            .with_tag("event", "rate_limit_alert")
            .with_tag("severity", policy.severity.as_str())
            .with_tag("routeGroup", event.group.as_str())
            .with_extra(serde_json::to_value(event).unwrap_or(Value::Null))
    }

    /// The informational signal for a critical alert held back by cooldown.
    pub fn suppressed_alert(event: &AlertEvent, policy: &AlertPolicy) -> Self {
        Self::new("Alert suppressed due to cooldown", CaptureLevel::Info)
            .with_tag("type", "alert_suppressed")
            .with_tag("reason", "cooldown")
            .with_tag("severity", policy.severity.as_str())
            .with_tag("routeGroup", event.group.as_str())
            .with_extra(serde_json::json!({
                "reason": "cooldown",
                "event": event,
            }))
    }

    /// The capture sent when a channel fails to deliver.
    pub fn channel_failure(kind: &ChannelKind, event: &AlertEvent, error: &ChannelError) -> Self {
        Self::new(format!("Failed to send {kind} alert: {error}"), CaptureLevel::Error)
            .with_tag("component", "alert-service")
            .with_tag("channel", kind.as_str())
            .with_extra(serde_json::to_value(event).unwrap_or(Value::Null))
    }

    /// Whether this report is a cooldown suppression signal.
    pub fn is_suppression(&self) -> bool {
        self.tags.get("type").is_some_and(|t| t == "alert_suppressed")
    }
}
