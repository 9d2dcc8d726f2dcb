//! Channel fakes that record what they were asked to deliver.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::{
    channels::{CaptureReport, ChannelError, ChannelSender, ErrorTracker},
    models::{AlertEvent, AlertPolicy},
};

/// A [`ChannelSender`] that records every event it receives.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<AlertEvent>>>,
    failing: Arc<AtomicBool>,
    yielding: Arc<AtomicBool>,
}

impl RecordingChannel {
    /// Creates a channel that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel whose deliveries fail after being recorded.
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.failing.store(true, Ordering::SeqCst);
        channel
    }

    /// Makes every delivery suspend before it is recorded, so concurrent
    /// sends interleave. Shared by all clones.
    pub fn set_yielding(&self, yielding: bool) {
        self.yielding.store(yielding, Ordering::SeqCst);
    }

    /// Events delivered so far.
    pub fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of deliveries attempted.
    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelSender for RecordingChannel {
    async fn send(&self, event: &AlertEvent, _policy: &AlertPolicy) -> Result<(), ChannelError> {
        if self.yielding.load(Ordering::SeqCst) {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        }
        self.sent.lock().unwrap().push(event.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::NotifyFailed("recording channel set to fail".into()));
        }
        Ok(())
    }
}

/// An [`ErrorTracker`] that keeps every report.
#[derive(Clone, Default)]
pub struct RecordingTracker {
    reports: Arc<Mutex<Vec<CaptureReport>>>,
}

impl RecordingTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports captured so far.
    pub fn reports(&self) -> Vec<CaptureReport> {
        self.reports.lock().unwrap().clone()
    }

    /// Captured cooldown suppression signals.
    pub fn suppressions(&self) -> Vec<CaptureReport> {
        self.reports().into_iter().filter(CaptureReport::is_suppression).collect()
    }
}

impl ErrorTracker for RecordingTracker {
    fn capture(&self, report: CaptureReport) {
        self.reports.lock().unwrap().push(report);
    }
}
