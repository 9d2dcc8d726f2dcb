//! Error types for the notification channels.

use thiserror::Error;

use crate::{channels::template::TemplateServiceError, http_client::HttpClientPoolError};

/// Defines the possible errors that can occur while delivering an alert.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The remote service rejected the notification.
    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error")]
    HttpClientError(#[from] HttpClientPoolError),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),

    /// An error related to the template rendering process.
    #[error("Template rendering error: {0}")]
    TemplateError(#[from] TemplateServiceError),

    /// The SMTP transport failed.
    #[error("SMTP error: {0}")]
    EmailError(#[from] lettre::transport::smtp::Error),

    /// The email message could not be assembled.
    #[error("Failed to build email: {0}")]
    EmailBuildError(#[from] lettre::error::Error),

    /// An email address could not be parsed.
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),
}
