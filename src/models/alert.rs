//! Data models for alert events and their severities.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The severity of an alert, as declared by a policy or by the event producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no action expected.
    Low,
    /// Worth a look.
    #[default]
    Medium,
    /// Needs attention soon.
    High,
    /// Needs attention now.
    Critical,
}

impl Severity {
    /// Returns the lowercase name of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Maps the severity onto the priority level used by channels that
    /// support one (critical to fatal, high to error, everything else to
    /// warning).
    pub fn capture_level(&self) -> CaptureLevel {
        match self {
            Severity::Critical => CaptureLevel::Fatal,
            Severity::High => CaptureLevel::Error,
            Severity::Low | Severity::Medium => CaptureLevel::Warning,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Priority level understood by error-tracking and paging channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureLevel {
    /// Informational signal.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Fatal.
    Fatal,
}

/// An alert-worthy condition reported by a producer such as a rate limiter.
///
/// Events are immutable once created. They are never persisted directly,
/// only as history entries derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// The entity that triggered the alert (an IP, a user id, ...).
    pub identifier: String,
    /// The alert group, used as the policy lookup key.
    pub group: String,
    /// Number of occurrences observed when the alert was raised.
    pub count: u64,
    /// Request path, if the event came from an HTTP request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Request method, if the event came from an HTTP request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// When the condition was detected, in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// User agent of the offending request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Severity suggested by the producer. The policy severity wins for routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl AlertEvent {
    /// Creates a new event with only the required fields set.
    pub fn new(group: impl Into<String>, identifier: impl Into<String>, count: u64) -> Self {
        Self {
            identifier: identifier.into(),
            group: group.into(),
            count,
            path: None,
            method: None,
            timestamp: None,
            user_agent: None,
            severity: None,
        }
    }

    /// Sets the request path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the request method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the detection timestamp in epoch milliseconds.
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the producer-suggested severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// The key that scopes cooldown suppression: `<group>:<identifier>`.
    pub fn cooldown_key(&self) -> String {
        format!("{}:{}", self.group, self.identifier)
    }

    /// Returns a copy of the event with its timestamp resolved, using `now`
    /// when the producer did not provide one.
    pub fn resolved(&self, now: DateTime<Utc>) -> Self {
        let mut event = self.clone();
        event.timestamp.get_or_insert(now.timestamp_millis());
        event
    }

    /// The event timestamp as a `DateTime`, falling back to `now`.
    pub fn occurred_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp.and_then(|ms| Utc.timestamp_millis_opt(ms).single()).unwrap_or(now)
    }
}
