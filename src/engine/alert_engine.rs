//! The alert engine: policy resolution, cooldown suppression, history and
//! fan-out for each incoming [`AlertEvent`].

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio_util::task::TaskTracker;

use crate::{
    channels::{CaptureReport, ChannelDispatcher, ChannelRegistry, DispatchReport},
    clock::{Clock, SystemClock},
    config::HistoryConfig,
    engine::{CooldownTracker, HistoryRecorder, PolicyCache},
    models::{AlertEvent, AlertPolicy, Severity, policy::DEFAULT_COOLDOWN},
    persistence::traits::{KeyValueStore, PolicyStore},
};

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// No policy, stored or default, covers the group.
    NoPolicy,
    /// The policy exists but is disabled.
    Disabled,
    /// A cooldown marker was active. `reported` is true when a suppression
    /// signal went to the error tracker.
    Suppressed {
        /// Whether the error tracker was told about the suppression.
        reported: bool,
    },
    /// The alert fired.
    Dispatched(DispatchReport),
}

/// Errors building an [`AlertEngine`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlertEngineBuildError {
    /// A required component was not supplied.
    #[error("{0} is required to build the alert engine")]
    MissingComponent(&'static str),
}

/// Decides whether an event fires and, if so, records and delivers it.
pub struct AlertEngine {
    policies: PolicyCache,
    cooldowns: CooldownTracker,
    history: HistoryRecorder,
    dispatcher: ChannelDispatcher,
    default_cooldown: Duration,
    clock: Arc<dyn Clock>,
    tasks: TaskTracker,
}

impl AlertEngine {
    /// Creates a new `AlertEngineBuilder`.
    pub fn builder() -> AlertEngineBuilder {
        AlertEngineBuilder::default()
    }

    /// Processes one event. Never fails: every internal error is logged and
    /// absorbed.
    ///
    /// The cooldown marker is written concurrently with the history append
    /// and fan-out, and has landed (or its failure has been logged) by the
    /// time this returns. Concurrent calls for the same cooldown key fire
    /// once.
    pub async fn send_alert(&self, event: AlertEvent) -> AlertOutcome {
        let Some(policy) = self.policies.get_policy(&event.group).await else {
            tracing::info!(group = %event.group, "No alert policy for group.");
            return AlertOutcome::NoPolicy;
        };

        if !policy.enabled {
            tracing::info!(group = %event.group, "Alert policy disabled.");
            return AlertOutcome::Disabled;
        }

        let cooldown_key = event.cooldown_key();
        let window = policy.cooldown_or(self.default_cooldown);

        let claim = if window.is_zero() {
            None
        } else {
            match self.cooldowns.try_claim(&cooldown_key) {
                Some(claim) => Some(claim),
                None => return self.suppress(&event, &policy, "alert already in flight"),
            }
        };
        if self.cooldowns.is_in_cooldown(&cooldown_key, window).await {
            return self.suppress(&event, &policy, "cooldown active");
        }

        let event = event.resolved(self.clock.now());
        tracing::warn!(
            group = %event.group,
            identifier = %event.identifier,
            count = event.count,
            severity = %policy.severity,
            channels = policy.channels.len(),
            "Triggering alert."
        );

        let (_, report) = tokio::join!(self.write_cooldown(&cooldown_key, window), async {
            self.history.append(&event.group, &event).await;
            self.dispatcher.fan_out(&event, &policy).await
        });
        drop(claim);

        AlertOutcome::Dispatched(report)
    }

    /// Hands `event` to a background task and returns immediately.
    pub fn send_alert_detached(self: &Arc<Self>, event: AlertEvent) {
        let engine = Arc::clone(self);
        self.tasks.spawn(async move {
            engine.send_alert(event).await;
        });
    }

    /// Fired alerts for `group`, newest first, at most `limit`. Empty on
    /// failure.
    pub async fn get_alert_history(&self, group: &str, limit: usize) -> Vec<AlertEvent> {
        self.history.list(group, limit).await
    }

    /// Waits for every detached send spawned so far, then accepts new ones
    /// again.
    pub async fn wait_for_background_tasks(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// The policy cache, for administrative refresh.
    pub fn policy_cache(&self) -> &PolicyCache {
        &self.policies
    }

    async fn write_cooldown(&self, key: &str, window: Duration) {
        if let Err(e) = self.cooldowns.set_cooldown(key, window).await {
            tracing::error!(cooldown_key = %key, error = %e, "Failed to set alert cooldown.");
        }
    }

    fn suppress(&self, event: &AlertEvent, policy: &AlertPolicy, reason: &str) -> AlertOutcome {
        tracing::info!(
            group = %event.group,
            identifier = %event.identifier,
            reason,
            "Alert suppressed."
        );
        AlertOutcome::Suppressed { reported: self.report_suppression(event, policy) }
    }

    fn report_suppression(&self, event: &AlertEvent, policy: &AlertPolicy) -> bool {
        if policy.severity != Severity::Critical {
            return false;
        }
        match self.dispatcher.tracker() {
            Some(tracker) => {
                tracker.capture(CaptureReport::suppressed_alert(event, policy));
                true
            }
            None => false,
        }
    }
}

/// A builder for [`AlertEngine`].
pub struct AlertEngineBuilder {
    policy_store: Option<Arc<dyn PolicyStore>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    registry: ChannelRegistry,
    default_policies: Vec<AlertPolicy>,
    policy_cache_ttl: Duration,
    default_cooldown: Duration,
    history: HistoryConfig,
    clock: Arc<dyn Clock>,
}

impl Default for AlertEngineBuilder {
    fn default() -> Self {
        Self {
            policy_store: None,
            kv_store: None,
            registry: ChannelRegistry::new(),
            default_policies: Vec::new(),
            policy_cache_ttl: Duration::from_secs(60),
            default_cooldown: DEFAULT_COOLDOWN,
            history: HistoryConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl AlertEngineBuilder {
    /// Sets the policy source of truth.
    pub fn policy_store(mut self, store: Arc<dyn PolicyStore>) -> Self {
        self.policy_store = Some(store);
        self
    }

    /// Sets the store backing cooldowns and history.
    pub fn kv_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Sets the channels alerts are delivered to.
    pub fn channels(mut self, registry: ChannelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the static fallback policies.
    pub fn default_policies(mut self, policies: Vec<AlertPolicy>) -> Self {
        self.default_policies = policies;
        self
    }

    /// Sets how long cached policies are served.
    pub fn policy_cache_ttl(mut self, ttl: Duration) -> Self {
        self.policy_cache_ttl = ttl;
        self
    }

    /// Sets the cooldown for policies without one.
    pub fn default_cooldown(mut self, cooldown: Duration) -> Self {
        self.default_cooldown = cooldown;
        self
    }

    /// Sets the history bounds.
    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// Sets the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<AlertEngine, AlertEngineBuildError> {
        let policy_store =
            self.policy_store.ok_or(AlertEngineBuildError::MissingComponent("policy store"))?;
        let kv_store =
            self.kv_store.ok_or(AlertEngineBuildError::MissingComponent("key-value store"))?;

        Ok(AlertEngine {
            policies: PolicyCache::new(
                policy_store,
                self.default_policies,
                self.policy_cache_ttl,
                self.clock.clone(),
            ),
            cooldowns: CooldownTracker::new(kv_store.clone()),
            history: HistoryRecorder::new(kv_store, self.history, self.clock.clone()),
            dispatcher: ChannelDispatcher::new(self.registry),
            default_cooldown: self.default_cooldown,
            clock: self.clock,
            tasks: TaskTracker::new(),
        })
    }
}
