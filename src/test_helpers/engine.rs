use std::sync::Arc;

use crate::{
    channels::ChannelRegistry,
    clock::ManualClock,
    engine::AlertEngine,
    models::{AlertPolicy, ChannelKind},
    persistence::InMemoryKeyValueStore,
    test_helpers::{RecordingChannel, RecordingTracker, StaticPolicyStore},
};

/// An engine wired to in-memory fakes, with handles on each of them.
pub struct TestEngine {
    /// The engine under test.
    pub engine: Arc<AlertEngine>,
    /// The policy source behind the cache.
    pub policy_store: StaticPolicyStore,
    /// The key-value store holding cooldowns and history.
    pub kv_store: Arc<InMemoryKeyValueStore>,
    /// The clock shared by every component.
    pub clock: ManualClock,
    /// The error tracker, also registered for the `sentry` channel.
    pub tracker: RecordingTracker,
    /// One recording sender per delivering channel kind.
    pub email: RecordingChannel,
    /// SMS sender.
    pub sms: RecordingChannel,
    /// Slack sender.
    pub slack: RecordingChannel,
    /// Teams sender.
    pub teams: RecordingChannel,
}

/// A helper function to create an `AlertEngine` whose stores are in memory
/// and whose channels record instead of delivering.
pub fn create_test_engine(policies: Vec<AlertPolicy>, defaults: Vec<AlertPolicy>) -> TestEngine {
    let clock = ManualClock::default();
    let policy_store = StaticPolicyStore::new(policies);
    let kv_store = Arc::new(InMemoryKeyValueStore::new(Arc::new(clock.clone())));
    let tracker = RecordingTracker::new();
    let (email, sms, slack, teams) = (
        RecordingChannel::new(),
        RecordingChannel::new(),
        RecordingChannel::new(),
        RecordingChannel::new(),
    );

    let mut registry = ChannelRegistry::new();
    registry
        .register(ChannelKind::Email, Arc::new(email.clone()))
        .register(ChannelKind::Sms, Arc::new(sms.clone()))
        .register(ChannelKind::Slack, Arc::new(slack.clone()))
        .register(ChannelKind::Teams, Arc::new(teams.clone()))
        .register_tracker(Arc::new(tracker.clone()));

    let engine = AlertEngine::builder()
        .policy_store(Arc::new(policy_store.clone()))
        .kv_store(kv_store.clone())
        .channels(registry)
        .default_policies(defaults)
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("test engine components are complete");

    TestEngine {
        engine: Arc::new(engine),
        policy_store,
        kv_store,
        clock,
        tracker,
        email,
        sms,
        slack,
        teams,
    }
}
