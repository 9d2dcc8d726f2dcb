#![warn(missing_docs)]
//! Ratewatch is an alerting engine for rate-limit violations: it resolves a
//! policy per route group, suppresses repeats within a cooldown, records
//! history and fans alerts out to notification channels.

pub mod channels;
pub mod clock;
pub mod config;
pub mod engine;
pub mod http_client;
pub mod initialization;
pub mod models;
pub mod persistence;
pub mod rate_limit;
pub mod test_helpers;
