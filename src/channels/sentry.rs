//! Error tracking through Sentry.

use sentry::ClientInitGuard;

use crate::{
    channels::traits::{CaptureReport, ErrorTracker},
    models::{CaptureLevel, channel::SentryConfig},
};

impl From<CaptureLevel> for sentry::Level {
    fn from(level: CaptureLevel) -> Self {
        match level {
            CaptureLevel::Info => sentry::Level::Info,
            CaptureLevel::Warning => sentry::Level::Warning,
            CaptureLevel::Error => sentry::Level::Error,
            CaptureLevel::Fatal => sentry::Level::Fatal,
        }
    }
}

/// Initializes the global Sentry client. Events are flushed when the guard
/// is dropped.
pub fn init_sentry(config: &SentryConfig) -> ClientInitGuard {
    sentry::init((
        config.dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config.environment.clone().map(Into::into),
            traces_sample_rate: config.traces_sample_rate,
            ..Default::default()
        },
    ))
}

/// Captures reports on the current Sentry hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentryTracker;

impl ErrorTracker for SentryTracker {
    fn capture(&self, report: CaptureReport) {
        let level = sentry::Level::from(report.level);
        sentry::with_scope(
            |scope| {
                for (key, value) in &report.tags {
                    scope.set_tag(key, value);
                }
                match &report.extra {
                    serde_json::Value::Object(map) =>
                        for (key, value) in map {
                            scope.set_extra(key, value.clone());
                        },
                    serde_json::Value::Null => {}
                    other => scope.set_extra("data", other.clone()),
                }
            },
            || sentry::capture_message(&report.message, level),
        );
    }
}
