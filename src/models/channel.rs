//! This module defines the configuration structures for notification channels.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::HttpRetryConfig;

/// A message template with a title and body, rendered per alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationMessage {
    /// The title template.
    pub title: String,
    /// The body template.
    pub body: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_true() -> bool {
    true
}

fn default_twilio_base_url() -> Url {
    Url::parse("https://api.twilio.com").expect("static URL is valid")
}

/// SMTP email channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Whether to upgrade the connection with STARTTLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
    /// Sender address.
    pub from: String,
    /// Recipient addresses, one message is sent per recipient.
    pub to: Vec<String>,
    /// Optional message template overriding the default.
    #[serde(default)]
    pub message: Option<NotificationMessage>,
}

/// SMS channel configuration (Twilio Messages API).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SmsConfig {
    /// Twilio account SID.
    pub account_sid: String,
    /// Twilio auth token.
    pub auth_token: String,
    /// Sending phone number.
    pub from_number: String,
    /// Recipient phone numbers.
    pub to_numbers: Vec<String>,
    /// Base URL of the messaging API.
    #[serde(default = "default_twilio_base_url")]
    pub api_base_url: Url,
    /// Optional message template overriding the default. Only the body is used.
    #[serde(default)]
    pub message: Option<NotificationMessage>,
    /// The retry policy configuration for HTTP requests.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

/// Slack incoming webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SlackConfig {
    /// The Slack webhook URL.
    pub slack_url: Url,
    /// Optional message template overriding the default.
    #[serde(default)]
    pub message: Option<NotificationMessage>,
    /// The retry policy configuration for HTTP requests.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

/// Microsoft Teams incoming webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TeamsConfig {
    /// The Teams webhook URL.
    pub teams_url: Url,
    /// Optional message template overriding the default.
    #[serde(default)]
    pub message: Option<NotificationMessage>,
    /// The retry policy configuration for HTTP requests.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

/// Sentry error-tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SentryConfig {
    /// Project DSN.
    pub dsn: String,
    /// Environment tag reported with every event.
    #[serde(default)]
    pub environment: Option<String>,
    /// Fraction of transactions sampled for tracing.
    #[serde(default)]
    pub traces_sample_rate: f32,
}

/// All configured channels. Absent sections are not registered.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ChannelsConfig {
    /// Email channel.
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// SMS channel.
    #[serde(default)]
    pub sms: Option<SmsConfig>,
    /// Slack channel.
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    /// Teams channel.
    #[serde(default)]
    pub teams: Option<TeamsConfig>,
    /// Sentry error tracking.
    #[serde(default)]
    pub sentry: Option<SentryConfig>,
}

/// Error types for channel configuration validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelConfigError {
    /// An email channel without recipients.
    #[error("Email channel requires at least one recipient.")]
    EmptyEmailRecipients,

    /// An SMS channel without recipients.
    #[error("SMS channel requires at least one recipient number.")]
    EmptySmsRecipients,

    /// An SMS channel with missing credentials.
    #[error("SMS channel account SID and auth token cannot be empty.")]
    EmptySmsCredentials,

    /// A webhook URL that is not http(s).
    #[error("Invalid {0} URL: must use http or https.")]
    InvalidWebhookUrl(&'static str),

    /// An empty Sentry DSN.
    #[error("Sentry DSN cannot be empty.")]
    EmptySentryDsn,
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

impl ChannelsConfig {
    /// Validates every configured channel.
    pub fn validate(&self) -> Result<(), ChannelConfigError> {
        if let Some(email) = &self.email
            && email.to.is_empty()
        {
            return Err(ChannelConfigError::EmptyEmailRecipients);
        }
        if let Some(sms) = &self.sms {
            if sms.account_sid.is_empty() || sms.auth_token.is_empty() {
                return Err(ChannelConfigError::EmptySmsCredentials);
            }
            if sms.to_numbers.is_empty() {
                return Err(ChannelConfigError::EmptySmsRecipients);
            }
        }
        if let Some(slack) = &self.slack
            && !is_http(&slack.slack_url)
        {
            return Err(ChannelConfigError::InvalidWebhookUrl("Slack"));
        }
        if let Some(teams) = &self.teams
            && !is_http(&teams.teams_url)
        {
            return Err(ChannelConfigError::InvalidWebhookUrl("Teams"));
        }
        if let Some(sentry) = &self.sentry
            && sentry.dsn.is_empty()
        {
            return Err(ChannelConfigError::EmptySentryDsn);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sms_config() -> SmsConfig {
        SmsConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550000000".to_string(),
            to_numbers: vec!["+15551111111".to_string()],
            api_base_url: default_twilio_base_url(),
            message: None,
            retry_policy: HttpRetryConfig::default(),
        }
    }

    #[test]
    fn test_empty_config_is_valid() {
        assert!(ChannelsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sms_requires_credentials_and_recipients() {
        let mut config = ChannelsConfig { sms: Some(sms_config()), ..Default::default() };
        assert!(config.validate().is_ok());

        config.sms.as_mut().unwrap().auth_token.clear();
        assert_eq!(config.validate(), Err(ChannelConfigError::EmptySmsCredentials));

        let mut sms = sms_config();
        sms.to_numbers.clear();
        config.sms = Some(sms);
        assert_eq!(config.validate(), Err(ChannelConfigError::EmptySmsRecipients));
    }

    #[test]
    fn test_webhook_urls_must_be_http() {
        let config = ChannelsConfig {
            slack: Some(SlackConfig {
                slack_url: Url::parse("ftp://hooks.slack.com/services/x").unwrap(),
                message: None,
                retry_policy: HttpRetryConfig::default(),
            }),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ChannelConfigError::InvalidWebhookUrl("Slack")));
    }

    #[test]
    fn test_sms_defaults_from_yaml() {
        let yaml = r#"
account_sid: AC1
auth_token: secret
from_number: "+1555"
to_numbers: ["+1666"]
"#;
        let sms: SmsConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(sms.api_base_url.as_str(), "https://api.twilio.com/");
        assert_eq!(sms.retry_policy, HttpRetryConfig::default());
    }
}
