//! Retrying HTTP clients for the outbound notification channels.

mod client;
mod pool;

pub use client::{HttpTimeouts, create_retryable_http_client};
pub use pool::{HttpClientPool, HttpClientPoolError};
