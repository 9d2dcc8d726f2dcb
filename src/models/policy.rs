//! Data models for alert policies.

use std::{collections::BTreeSet, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::models::alert::Severity;

/// Cooldown applied when a policy does not declare one.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// A notification channel a policy can route alerts to.
///
/// Unrecognized names are kept as [`ChannelKind::Unknown`] so that newer
/// policy rows can be read by older engines; they are ignored at dispatch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelKind {
    /// SMTP email.
    Email,
    /// SMS text message.
    Sms,
    /// Slack incoming webhook.
    Slack,
    /// Microsoft Teams incoming webhook.
    Teams,
    /// Error-tracking capture (Sentry).
    Sentry,
    /// Live push to connected dashboards, delivered by the caller.
    Websocket,
    /// A channel name this build does not know about.
    Unknown(String),
}

impl ChannelKind {
    /// Returns the wire name of the channel.
    pub fn as_str(&self) -> &str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Slack => "slack",
            ChannelKind::Teams => "teams",
            ChannelKind::Sentry => "sentry",
            ChannelKind::Websocket => "websocket",
            ChannelKind::Unknown(name) => name,
        }
    }
}

impl From<String> for ChannelKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "email" => ChannelKind::Email,
            "sms" => ChannelKind::Sms,
            "slack" => ChannelKind::Slack,
            "teams" => ChannelKind::Teams,
            "sentry" => ChannelKind::Sentry,
            "websocket" => ChannelKind::Websocket,
            _ => ChannelKind::Unknown(value),
        }
    }
}

impl From<&str> for ChannelKind {
    fn from(value: &str) -> Self {
        ChannelKind::from(value.to_string())
    }
}

impl From<ChannelKind> for String {
    fn from(value: ChannelKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_enabled() -> bool {
    true
}

/// Describes whether and how alerts for a group are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// The alert group this policy applies to.
    pub route_group: String,
    /// Disabled policies never fire.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Severity used for routing and priority mapping.
    #[serde(default)]
    pub severity: Severity,
    /// Suppression window after a fired alert, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<u64>,
    /// Channels the alert is delivered to.
    #[serde(default)]
    pub channels: BTreeSet<ChannelKind>,
}

impl AlertPolicy {
    /// Creates an enabled policy with no channels and the default cooldown.
    pub fn new(route_group: impl Into<String>, severity: Severity) -> Self {
        Self {
            route_group: route_group.into(),
            enabled: true,
            severity,
            cooldown_ms: None,
            channels: BTreeSet::new(),
        }
    }

    /// The cooldown window for this policy, or `default` if none is declared.
    pub fn cooldown_or(&self, default: Duration) -> Duration {
        self.cooldown_ms.map(Duration::from_millis).unwrap_or(default)
    }

    /// The cooldown window for this policy, or five minutes if none is
    /// declared.
    pub fn cooldown(&self) -> Duration {
        self.cooldown_or(DEFAULT_COOLDOWN)
    }
}
