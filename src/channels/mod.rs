//! # Notification channels
//!
//! Delivery of a single alert to the channels named by its policy.
//!
//! - **`ChannelSender`**: asynchronous delivery (email, SMS, Slack, Teams).
//! - **`ErrorTracker`**: synchronous capture (Sentry). It also receives
//!   channel failures and cooldown suppression signals.
//! - **`ChannelRegistry`**: the kind-to-implementation map. Adding a channel
//!   is a registration.
//! - **`ChannelDispatcher`**: concurrent fan-out that tolerates individual
//!   failures.

use std::sync::Arc;

pub mod dispatcher;
pub mod email;
pub mod error;
pub mod sentry;
pub mod sms;
pub mod template;
pub mod traits;
pub mod webhook;

pub use dispatcher::{ChannelDispatcher, ChannelHandle, ChannelOutcome, ChannelRegistry, DispatchReport};
pub use error::ChannelError;
pub use traits::{CaptureReport, ChannelSender, ErrorTracker};

use self::{
    email::EmailChannel, sentry::SentryTracker, sms::SmsChannel, template::TemplateService,
    webhook::WebhookChannel,
};
use crate::{
    http_client::HttpClientPool,
    models::{ChannelKind, channel::ChannelsConfig},
};

impl ChannelRegistry {
    /// Builds a registry with one implementation per configured channel.
    ///
    /// The Sentry tracker is registered only when `sentry` is configured; the
    /// caller owns the client guard returned by `init_sentry`.
    pub async fn from_config(
        config: &ChannelsConfig,
        client_pool: &HttpClientPool,
    ) -> Result<Self, ChannelError> {
        let templates = Arc::new(TemplateService::new());
        let mut registry = ChannelRegistry::new();

        if let Some(email) = &config.email {
            registry.register(ChannelKind::Email, Arc::new(EmailChannel::new(email, templates.clone())?));
        }
        if let Some(sms) = &config.sms {
            let client = client_pool.get_or_create(&sms.retry_policy).await?;
            registry.register(ChannelKind::Sms, Arc::new(SmsChannel::new(sms, client, templates.clone())?));
        }
        if let Some(slack) = &config.slack {
            let client = client_pool.get_or_create(&slack.retry_policy).await?;
            registry.register(ChannelKind::Slack, Arc::new(WebhookChannel::slack(slack, client, templates.clone())));
        }
        if let Some(teams) = &config.teams {
            let client = client_pool.get_or_create(&teams.retry_policy).await?;
            registry.register(ChannelKind::Teams, Arc::new(WebhookChannel::teams(teams, client, templates.clone())));
        }
        if config.sentry.is_some() {
            registry.register_tracker(Arc::new(SentryTracker));
        }

        tracing::info!(
            channels = ?registry.kinds().map(ChannelKind::as_str).collect::<Vec<_>>(),
            "Notification channels registered."
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::{
        config::HttpRetryConfig,
        models::channel::{SentryConfig, SlackConfig, TeamsConfig},
    };

    #[tokio::test]
    async fn test_registry_from_config_registers_configured_channels() {
        let retry = HttpRetryConfig::default();
        let config = ChannelsConfig {
            slack: Some(SlackConfig {
                slack_url: Url::parse("https://hooks.slack.com/services/T/B/X").unwrap(),
                message: None,
                retry_policy: retry.clone(),
            }),
            teams: Some(TeamsConfig {
                teams_url: Url::parse("https://example.webhook.office.com/x").unwrap(),
                message: None,
                retry_policy: HttpRetryConfig { max_retries: 1, ..retry },
            }),
            sentry: Some(SentryConfig {
                dsn: "https://key@o0.ingest.sentry.io/0".into(),
                environment: None,
                traces_sample_rate: 0.0,
            }),
            ..Default::default()
        };
        let pool = HttpClientPool::new();

        let registry = ChannelRegistry::from_config(&config, &pool).await.unwrap();

        assert!(matches!(registry.get(&ChannelKind::Slack), Some(ChannelHandle::Deliver(_))));
        assert!(matches!(registry.get(&ChannelKind::Teams), Some(ChannelHandle::Deliver(_))));
        assert!(matches!(registry.get(&ChannelKind::Sentry), Some(ChannelHandle::Capture(_))));
        assert!(registry.get(&ChannelKind::Email).is_none());
        assert!(registry.tracker().is_some());
        assert_eq!(pool.len().await, 2);
    }
}
