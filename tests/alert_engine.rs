//! Integration tests for the AlertEngine

use std::{sync::Arc, time::Duration};

use ratewatch::{
    channels::ChannelRegistry,
    clock::Clock,
    engine::{AlertEngine, AlertOutcome},
    models::{AlertEvent, AlertPolicy, CaptureLevel, ChannelKind, Severity},
    persistence::{InMemoryKeyValueStore, traits::KeyValueStore},
    test_helpers::{
        FailingKeyValueStore, ManualClock, PolicyBuilder, RecordingChannel, RecordingTracker,
        StaticPolicyStore, TestEngine, create_test_engine,
    },
};

fn login_slack_policy() -> AlertPolicy {
    PolicyBuilder::new("login")
        .severity(Severity::High)
        .cooldown_ms(300_000)
        .channel(ChannelKind::Slack)
        .build()
}

fn critical_email_sms_policy() -> AlertPolicy {
    PolicyBuilder::new("login")
        .severity(Severity::Critical)
        .cooldown_ms(60_000)
        .channel(ChannelKind::Email)
        .channel(ChannelKind::Sms)
        .build()
}

async fn history_len(ctx: &TestEngine, group: &str) -> usize {
    ctx.kv_store.range(&format!("alert_history:{group}"), 0, -1).await.unwrap().len()
}

#[tokio::test]
async fn test_first_alert_dispatches_sets_cooldown_and_records_history() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);

    let outcome = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    ctx.engine.wait_for_background_tasks().await;

    let AlertOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(report.delivered, vec![ChannelKind::Slack]);
    assert_eq!(ctx.slack.call_count(), 1);
    assert_eq!(ctx.kv_store.ttl("alert_cooldown:login:ip-1"), Some(Duration::from_millis(300_000)));

    let history = ctx.engine.get_alert_history("login", 50).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].identifier, "ip-1");
    assert_eq!(history[0].timestamp, Some(ctx.clock.now().timestamp_millis()));
}

#[tokio::test]
async fn test_repeat_within_cooldown_is_suppressed() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);

    ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    ctx.clock.advance(Duration::from_millis(500));

    let outcome = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 7)).await;

    assert_eq!(outcome, AlertOutcome::Suppressed { reported: false });
    assert_eq!(ctx.slack.call_count(), 1);
    assert_eq!(history_len(&ctx, "login").await, 1);
    assert!(ctx.tracker.reports().is_empty());
}

#[tokio::test]
async fn test_cooldown_is_scoped_per_identifier_and_expires() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);

    ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    ctx.engine.send_alert(AlertEvent::new("login", "ip-2", 6)).await;
    ctx.engine.wait_for_background_tasks().await;
    assert_eq!(ctx.slack.call_count(), 2);

    ctx.clock.advance(Duration::from_secs(301));
    let outcome = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    assert!(matches!(outcome, AlertOutcome::Dispatched(_)));
    assert_eq!(ctx.slack.call_count(), 3);
}

#[tokio::test]
async fn test_unknown_group_without_default_does_nothing() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);

    let outcome = ctx.engine.send_alert(AlertEvent::new("unknown-group", "ip-1", 6)).await;
    ctx.engine.wait_for_background_tasks().await;

    assert_eq!(outcome, AlertOutcome::NoPolicy);
    assert_eq!(ctx.slack.call_count(), 0);
    assert_eq!(history_len(&ctx, "unknown-group").await, 0);
    assert!(!ctx.kv_store.contains_key("alert_cooldown:unknown-group:ip-1"));
}

#[tokio::test]
async fn test_critical_suppression_is_reported_once_to_tracker() {
    let ctx = create_test_engine(vec![critical_email_sms_policy()], vec![]);

    ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    assert_eq!(ctx.email.call_count(), 1);
    assert_eq!(ctx.sms.call_count(), 1);

    let outcome = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 9)).await;

    assert_eq!(outcome, AlertOutcome::Suppressed { reported: true });
    assert_eq!(ctx.email.call_count(), 1);
    assert_eq!(ctx.sms.call_count(), 1);

    let suppressions = ctx.tracker.suppressions();
    assert_eq!(suppressions.len(), 1);
    assert_eq!(suppressions[0].tags["reason"], "cooldown");
    assert_eq!(suppressions[0].level, CaptureLevel::Info);
    assert_eq!(ctx.tracker.reports().len(), 1);
}

#[tokio::test]
async fn test_disabled_default_policy_sets_no_cooldown() {
    let disabled = PolicyBuilder::new("signup").channel(ChannelKind::Slack).disabled().build();
    let ctx = create_test_engine(vec![], vec![disabled]);

    let outcome = ctx.engine.send_alert(AlertEvent::new("signup", "ip-1", 6)).await;
    ctx.engine.wait_for_background_tasks().await;

    assert_eq!(outcome, AlertOutcome::Disabled);
    assert_eq!(ctx.slack.call_count(), 0);
    assert!(!ctx.kv_store.contains_key("alert_cooldown:signup:ip-1"));
}

#[tokio::test]
async fn test_repeated_calls_dispatch_exactly_once() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);

    for count in 6..12 {
        ctx.engine.send_alert(AlertEvent::new("login", "ip-1", count)).await;
    }

    assert_eq!(ctx.slack.call_count(), 1);
    assert_eq!(ctx.slack.sent()[0].count, 6);
}

#[tokio::test]
async fn test_back_to_back_calls_see_the_first_cooldown() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);
    ctx.slack.set_yielding(true);

    let first = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    assert!(ctx.kv_store.contains_key("alert_cooldown:login:ip-1"));
    let second = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 7)).await;

    assert!(matches!(first, AlertOutcome::Dispatched(_)));
    assert_eq!(second, AlertOutcome::Suppressed { reported: false });
    assert_eq!(ctx.slack.call_count(), 1);
}

#[tokio::test]
async fn test_burst_of_detached_sends_fires_once() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);
    ctx.slack.set_yielding(true);

    for count in 6..11 {
        ctx.engine.send_alert_detached(AlertEvent::new("login", "ip-1", count));
    }
    ctx.engine.wait_for_background_tasks().await;

    assert_eq!(ctx.slack.call_count(), 1);
    assert_eq!(history_len(&ctx, "login").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_across_threads_fire_once_per_identifier() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);
    ctx.slack.set_yielding(true);

    for count in 0..20 {
        let identifier = if count % 2 == 0 { "ip-1" } else { "ip-2" };
        ctx.engine.send_alert_detached(AlertEvent::new("login", identifier, count));
    }
    ctx.engine.wait_for_background_tasks().await;

    assert_eq!(ctx.slack.call_count(), 2);
}

#[tokio::test]
async fn test_policy_store_fetched_once_per_ttl() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);
    let cache = ctx.engine.policy_cache();

    for _ in 0..5 {
        assert!(cache.get_policy("login").await.is_some());
        assert!(cache.get_policy("missing").await.is_none());
    }
    assert_eq!(ctx.policy_store.fetch_count(), 1);

    ctx.clock.advance(Duration::from_secs(60));
    cache.get_policy("login").await;
    cache.get_policy("login").await;
    assert_eq!(ctx.policy_store.fetch_count(), 2);
}

#[tokio::test]
async fn test_policy_changes_are_picked_up_after_ttl() {
    let ctx = create_test_engine(vec![login_slack_policy()], vec![]);
    assert!(ctx.engine.policy_cache().get_policy("login").await.is_some());

    ctx.policy_store.set_policies(vec![]);
    assert!(ctx.engine.policy_cache().get_policy("login").await.is_some());

    ctx.clock.advance(Duration::from_secs(61));
    assert!(ctx.engine.policy_cache().get_policy("login").await.is_none());
}

#[tokio::test]
async fn test_unreachable_policy_store_falls_back_to_default() {
    let default = PolicyBuilder::new("login").channel(ChannelKind::Teams).build();
    let ctx = create_test_engine(vec![login_slack_policy()], vec![default]);
    ctx.policy_store.set_failing(true);

    let outcome = ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;

    assert!(matches!(outcome, AlertOutcome::Dispatched(_)));
    assert_eq!(ctx.teams.call_count(), 1);
    assert_eq!(ctx.slack.call_count(), 0);
}

#[tokio::test]
async fn test_history_keeps_most_recent_hundred() {
    let policy = PolicyBuilder::new("login").cooldown_ms(60_000).build();
    let ctx = create_test_engine(vec![policy], vec![]);

    for i in 0..150 {
        ctx.engine.send_alert(AlertEvent::new("login", format!("ip-{i}"), 6)).await;
    }
    ctx.engine.wait_for_background_tasks().await;

    let history = ctx.engine.get_alert_history("login", 500).await;
    assert_eq!(history.len(), 100);
    assert_eq!(history[0].identifier, "ip-149");
    assert_eq!(history[99].identifier, "ip-50");
    assert_eq!(ctx.kv_store.ttl("alert_history:login"), Some(Duration::from_secs(604_800)));

    assert_eq!(ctx.engine.get_alert_history("login", 5).await.len(), 5);
}

#[tokio::test]
async fn test_failing_channel_does_not_affect_others() {
    let clock = ManualClock::default();
    let failing = RecordingChannel::failing();
    let teams = RecordingChannel::new();
    let tracker = RecordingTracker::new();
    let mut registry = ChannelRegistry::new();
    registry
        .register(ChannelKind::Slack, Arc::new(failing.clone()))
        .register(ChannelKind::Teams, Arc::new(teams.clone()))
        .register_tracker(Arc::new(tracker.clone()));

    let policy = PolicyBuilder::new("login")
        .channel(ChannelKind::Slack)
        .channel(ChannelKind::Teams)
        .channel(ChannelKind::Websocket)
        .channel(ChannelKind::from("pager"))
        .build();
    let engine = AlertEngine::builder()
        .policy_store(Arc::new(StaticPolicyStore::new(vec![policy])))
        .kv_store(Arc::new(InMemoryKeyValueStore::new(Arc::new(clock.clone()))))
        .channels(registry)
        .clock(Arc::new(clock))
        .build()
        .unwrap();

    let outcome = engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;

    let AlertOutcome::Dispatched(report) = outcome else {
        panic!("expected dispatch, got {outcome:?}");
    };
    assert_eq!(report.delivered, vec![ChannelKind::Teams]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, ChannelKind::Slack);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(failing.call_count(), 1);
    assert_eq!(teams.call_count(), 1);

    let reports = tracker.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tags["component"], "alert-service");
    assert_eq!(reports[0].tags["channel"], "slack");
}

#[tokio::test]
async fn test_broken_kv_store_still_delivers() {
    let slack = RecordingChannel::new();
    let mut registry = ChannelRegistry::new();
    registry.register(ChannelKind::Slack, Arc::new(slack.clone()));

    let engine = AlertEngine::builder()
        .policy_store(Arc::new(StaticPolicyStore::new(vec![login_slack_policy()])))
        .kv_store(Arc::new(FailingKeyValueStore))
        .channels(registry)
        .build()
        .unwrap();

    let outcome = engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;
    engine.wait_for_background_tasks().await;

    assert!(matches!(outcome, AlertOutcome::Dispatched(_)));
    assert_eq!(slack.call_count(), 1);
    assert!(engine.get_alert_history("login", 10).await.is_empty());
}

#[tokio::test]
async fn test_error_tracking_channel_receives_rate_limit_capture() {
    let policy = PolicyBuilder::new("login")
        .severity(Severity::Critical)
        .channel(ChannelKind::Sentry)
        .build();
    let ctx = create_test_engine(vec![policy], vec![]);

    ctx.engine.send_alert(AlertEvent::new("login", "ip-1", 6)).await;

    let reports = ctx.tracker.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].level, CaptureLevel::Fatal);
    assert_eq!(reports[0].tags["event"], "rate_limit_alert");
    assert_eq!(reports[0].tags["routeGroup"], "login");
    assert_eq!(reports[0].extra["identifier"], "ip-1");
}
