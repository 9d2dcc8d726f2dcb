//! This module contains the data models for the ratewatch alert engine.

pub mod alert;
pub mod channel;
pub mod policy;

pub use alert::{AlertEvent, CaptureLevel, Severity};
pub use channel::NotificationMessage;
pub use policy::{AlertPolicy, ChannelKind};
