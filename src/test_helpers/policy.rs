//! A builder for creating `AlertPolicy` instances in tests.

use crate::models::{AlertPolicy, ChannelKind, Severity};

/// A builder for creating `AlertPolicy` instances in tests.
pub struct PolicyBuilder {
    policy: AlertPolicy,
}

impl PolicyBuilder {
    /// Creates a builder for an enabled, medium severity policy on `group`.
    pub fn new(group: &str) -> Self {
        Self { policy: AlertPolicy::new(group, Severity::Medium) }
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.policy.severity = severity;
        self
    }

    /// Sets the cooldown in milliseconds.
    pub fn cooldown_ms(mut self, ms: u64) -> Self {
        self.policy.cooldown_ms = Some(ms);
        self
    }

    /// Adds a channel.
    pub fn channel(mut self, kind: ChannelKind) -> Self {
        self.policy.channels.insert(kind);
        self
    }

    /// Marks the policy disabled.
    pub fn disabled(mut self) -> Self {
        self.policy.enabled = false;
        self
    }

    /// Builds the policy.
    pub fn build(self) -> AlertPolicy {
        self.policy
    }
}
