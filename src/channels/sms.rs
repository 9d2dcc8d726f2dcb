//! SMS channel backed by the Twilio Messages REST API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

use crate::{
    channels::{
        error::ChannelError,
        template::{TemplateService, alert_context},
        traits::ChannelSender,
    },
    models::{AlertEvent, AlertPolicy, NotificationMessage, channel::SmsConfig},
};

/// Default SMS text, kept short enough for a single segment in most cases.
const DEFAULT_SMS_BODY: &str =
    "[{{ severity_upper }}] {{ group }}: {{ count }} requests from {{ identifier }}";

/// Sends one text message per configured recipient.
pub struct SmsChannel {
    messages_url: Url,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_numbers: Vec<String>,
    message: Option<NotificationMessage>,
    client: Arc<ClientWithMiddleware>,
    templates: Arc<TemplateService>,
}

impl SmsChannel {
    /// Creates the channel, resolving the account's Messages endpoint.
    pub fn new(
        config: &SmsConfig,
        client: Arc<ClientWithMiddleware>,
        templates: Arc<TemplateService>,
    ) -> Result<Self, ChannelError> {
        let messages_url = config
            .api_base_url
            .join(&format!("2010-04-01/Accounts/{}/Messages.json", config.account_sid))
            .map_err(|e| ChannelError::ConfigError(format!("Invalid SMS API URL: {e}")))?;
        Ok(Self {
            messages_url,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            to_numbers: config.to_numbers.clone(),
            message: config.message.clone(),
            client,
            templates,
        })
    }

    async fn send_to(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let params = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];
        let response = self
            .client
            .post(self.messages_url.clone())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::NotifyFailed(format!(
                "SMS request to {to} failed with status: {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for SmsChannel {
    async fn send(&self, event: &AlertEvent, policy: &AlertPolicy) -> Result<(), ChannelError> {
        let context = alert_context(event, policy, Utc::now());
        let template = self.message.as_ref().map_or(DEFAULT_SMS_BODY, |m| m.body.as_str());
        let body = self.templates.render(template, &context)?;

        let results =
            futures::future::join_all(self.to_numbers.iter().map(|to| self.send_to(to, &body)))
                .await;

        let mut first_error = None;
        for (to, result) in self.to_numbers.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(to = %to, error = %e, "Failed to send SMS alert.");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(
                    group = %event.group,
                    recipients = self.to_numbers.len(),
                    "SMS alert sent."
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;
    use crate::{config::HttpRetryConfig, models::Severity};

    fn config(base: &str, to: &[&str]) -> SmsConfig {
        SmsConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_number: "+15550000000".into(),
            to_numbers: to.iter().map(|s| s.to_string()).collect(),
            api_base_url: Url::parse(base).unwrap(),
            message: None,
            retry_policy: HttpRetryConfig::default(),
        }
    }

    fn channel(config: &SmsConfig) -> SmsChannel {
        let client =
            Arc::new(reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build());
        SmsChannel::new(config, client, Arc::new(TemplateService::new())).unwrap()
    }

    #[tokio::test]
    async fn test_sms_sent_to_every_recipient() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("From".into(), "+15550000000".into()),
                Matcher::UrlEncoded(
                    "Body".into(),
                    "[CRITICAL] payments: 12 requests from user-7".into(),
                ),
            ]))
            .with_status(201)
            .expect(2)
            .create_async()
            .await;

        let config = config(&server.url(), &["+15551111111", "+15552222222"]);
        let policy = AlertPolicy::new("payments", Severity::Critical);

        channel(&config).send(&AlertEvent::new("payments", "user-7", 12), &policy).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sms_failure_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/2010-04-01/Accounts/AC123/Messages.json")
            .with_status(401)
            .create_async()
            .await;

        let config = config(&server.url(), &["+15551111111"]);
        let policy = AlertPolicy::new("payments", Severity::High);

        let result = channel(&config).send(&AlertEvent::new("payments", "user-7", 12), &policy).await;
        assert!(matches!(result, Err(ChannelError::NotifyFailed(_))));
    }
}
