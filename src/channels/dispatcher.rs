//! Fan-out of one alert to every channel named by its policy.

use std::{collections::HashMap, sync::Arc};

use futures::future::join_all;

use crate::{
    channels::{
        error::ChannelError,
        traits::{CaptureReport, ChannelSender, ErrorTracker},
    },
    models::{AlertEvent, AlertPolicy, ChannelKind},
};

/// How a registered channel delivers.
#[derive(Clone)]
pub enum ChannelHandle {
    /// Asynchronous delivery, awaited jointly with the other channels.
    Deliver(Arc<dyn ChannelSender>),
    /// Synchronous capture to an error tracker.
    Capture(Arc<dyn ErrorTracker>),
}

/// Maps channel kinds to their implementations.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelKind, ChannelHandle>,
    tracker: Option<Arc<dyn ErrorTracker>>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asynchronous sender for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: ChannelKind, sender: Arc<dyn ChannelSender>) -> &mut Self {
        self.channels.insert(kind, ChannelHandle::Deliver(sender));
        self
    }

    /// Registers the error tracker. It serves the `sentry` channel and also
    /// receives channel failures and cooldown suppression signals.
    pub fn register_tracker(&mut self, tracker: Arc<dyn ErrorTracker>) -> &mut Self {
        self.channels.insert(ChannelKind::Sentry, ChannelHandle::Capture(tracker.clone()));
        self.tracker = Some(tracker);
        self
    }

    /// The handle registered for `kind`.
    pub fn get(&self, kind: &ChannelKind) -> Option<&ChannelHandle> {
        self.channels.get(kind)
    }

    /// The error tracker, if one is registered.
    pub fn tracker(&self) -> Option<&Arc<dyn ErrorTracker>> {
        self.tracker.as_ref()
    }

    /// Registered kinds, in no particular order.
    pub fn kinds(&self) -> impl Iterator<Item = &ChannelKind> {
        self.channels.keys()
    }
}

/// Result of delivering to a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// The channel accepted the alert.
    Delivered,
    /// The channel failed; the message describes why.
    Failed(String),
    /// No implementation handles this kind.
    Skipped,
}

/// Per-channel results of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Channels that accepted the alert.
    pub delivered: Vec<ChannelKind>,
    /// Channels that failed, with the error message.
    pub failed: Vec<(ChannelKind, String)>,
    /// Channels with no implementation.
    pub skipped: Vec<ChannelKind>,
}

impl DispatchReport {
    /// Whether every attempted channel succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: ChannelKind, outcome: ChannelOutcome) {
        match outcome {
            ChannelOutcome::Delivered => self.delivered.push(kind),
            ChannelOutcome::Failed(error) => self.failed.push((kind, error)),
            ChannelOutcome::Skipped => self.skipped.push(kind),
        }
    }
}

/// Delivers alerts through the channels in a [`ChannelRegistry`].
pub struct ChannelDispatcher {
    registry: ChannelRegistry,
}

impl ChannelDispatcher {
    /// Creates a dispatcher over `registry`.
    pub fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }

    /// The error tracker, if one is registered.
    pub fn tracker(&self) -> Option<&Arc<dyn ErrorTracker>> {
        self.registry.tracker()
    }

    /// Delivers `event` to one channel. Failures are logged and, when a
    /// tracker is registered, captured; they are never returned.
    pub async fn dispatch(
        &self,
        kind: &ChannelKind,
        event: &AlertEvent,
        policy: &AlertPolicy,
    ) -> ChannelOutcome {
        match self.registry.get(kind) {
            Some(ChannelHandle::Capture(tracker)) => {
                tracker.capture(CaptureReport::rate_limit_alert(event, policy));
                ChannelOutcome::Delivered
            }
            Some(ChannelHandle::Deliver(sender)) => match sender.send(event, policy).await {
                Ok(()) => ChannelOutcome::Delivered,
                Err(e) => {
                    self.report_failure(kind, event, &e);
                    ChannelOutcome::Failed(e.to_string())
                }
            },
            None => {
                tracing::debug!(channel = %kind, group = %event.group, "No sender for channel, skipping.");
                ChannelOutcome::Skipped
            }
        }
    }

    /// Delivers `event` to every channel in `policy.channels` concurrently and
    /// waits for all of them. One failing channel never affects another.
    pub async fn fan_out(&self, event: &AlertEvent, policy: &AlertPolicy) -> DispatchReport {
        let outcomes = join_all(policy.channels.iter().map(|kind| async move {
            (kind.clone(), self.dispatch(kind, event, policy).await)
        }))
        .await;

        let mut report = DispatchReport::default();
        for (kind, outcome) in outcomes {
            report.record(kind, outcome);
        }
        report
    }

    fn report_failure(&self, kind: &ChannelKind, event: &AlertEvent, error: &ChannelError) {
        tracing::error!(
            channel = %kind,
            group = %event.group,
            identifier = %event.identifier,
            count = event.count,
            error = %error,
            "Failed to send alert."
        );
        if let Some(tracker) = self.registry.tracker() {
            tracker.capture(CaptureReport::channel_failure(kind, event, error));
        }
    }
}
