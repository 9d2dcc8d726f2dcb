//! Chat webhook channels (Slack and Microsoft Teams).

mod payload;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

pub use payload::{AlertFacts, SlackPayloadBuilder, TeamsPayloadBuilder, WebhookPayloadBuilder};

use crate::{
    channels::{
        error::ChannelError,
        template::{TemplateService, alert_context},
        traits::ChannelSender,
    },
    models::{
        AlertEvent, AlertPolicy, NotificationMessage,
        channel::{SlackConfig, TeamsConfig},
    },
};

/// Posts rendered alerts to an incoming-webhook URL.
pub struct WebhookChannel {
    name: &'static str,
    url: Url,
    message: Option<NotificationMessage>,
    client: Arc<ClientWithMiddleware>,
    builder: Box<dyn WebhookPayloadBuilder>,
    templates: Arc<TemplateService>,
}

impl WebhookChannel {
    /// A Slack channel posting `blocks` payloads.
    pub fn slack(
        config: &SlackConfig,
        client: Arc<ClientWithMiddleware>,
        templates: Arc<TemplateService>,
    ) -> Self {
        Self {
            name: "slack",
            url: config.slack_url.clone(),
            message: config.message.clone(),
            client,
            builder: Box::new(SlackPayloadBuilder),
            templates,
        }
    }

    /// A Teams channel posting Adaptive Cards.
    pub fn teams(
        config: &TeamsConfig,
        client: Arc<ClientWithMiddleware>,
        templates: Arc<TemplateService>,
    ) -> Self {
        Self {
            name: "teams",
            url: config.teams_url.clone(),
            message: config.message.clone(),
            client,
            builder: Box::new(TeamsPayloadBuilder),
            templates,
        }
    }

    /// Sends a JSON payload to the webhook.
    pub async fn notify_json(&self, payload: &serde_json::Value) -> Result<(), ChannelError> {
        let response = self.client.post(self.url.clone()).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::NotifyFailed(format!(
                "{} webhook request failed with status: {status}",
                self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for WebhookChannel {
    async fn send(&self, event: &AlertEvent, policy: &AlertPolicy) -> Result<(), ChannelError> {
        let now = Utc::now();
        let context = alert_context(event, policy, now);
        let message = self.templates.render_message(self.message.as_ref(), &context)?;
        let facts = AlertFacts {
            identifier: event.identifier.clone(),
            count: event.count,
            group: event.group.clone(),
            severity: policy.severity.as_str().to_uppercase(),
            timestamp: event.occurred_at(now).to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let payload = self.builder.build_payload(&message, &facts);
        self.notify_json(&payload).await?;

        tracing::info!(
            channel = self.name,
            group = %event.group,
            identifier = %event.identifier,
            "Webhook alert sent."
        );
        Ok(())
    }
}
