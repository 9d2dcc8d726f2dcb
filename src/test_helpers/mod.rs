//! A set of helpers for testing

mod channels;
mod engine;
mod kv_store;
mod policy;
mod policy_store;

pub use channels::{RecordingChannel, RecordingTracker};
pub use engine::{TestEngine, create_test_engine};
pub use kv_store::FailingKeyValueStore;
pub use policy::PolicyBuilder;
pub use policy_store::StaticPolicyStore;

pub use crate::clock::ManualClock;
