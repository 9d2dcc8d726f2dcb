//! SMTP email channel.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::{
    channels::{
        error::ChannelError,
        template::{RenderedMessage, TemplateService, alert_context},
        traits::ChannelSender,
    },
    models::{AlertEvent, AlertPolicy, NotificationMessage, channel::EmailConfig},
};

fn parse_mailbox(address: &str) -> Result<Mailbox, ChannelError> {
    address.parse().map_err(|_| ChannelError::InvalidAddress(address.to_string()))
}

/// Builds one plain-text email per recipient.
pub fn build_messages(
    from: &Mailbox,
    to: &[Mailbox],
    rendered: &RenderedMessage,
) -> Result<Vec<Message>, ChannelError> {
    to.iter()
        .map(|recipient| {
            Message::builder()
                .from(from.clone())
                .to(recipient.clone())
                .subject(rendered.title.as_str())
                .header(ContentType::TEXT_PLAIN)
                .body(rendered.body.clone())
                .map_err(ChannelError::from)
        })
        .collect()
}

/// Delivers alerts over SMTP.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    message: Option<NotificationMessage>,
    templates: Arc<TemplateService>,
}

impl EmailChannel {
    /// Creates the channel. Addresses are validated up front.
    pub fn new(config: &EmailConfig, templates: Arc<TemplateService>) -> Result<Self, ChannelError> {
        let from = parse_mailbox(&config.from)?;
        let to = config.to.iter().map(|a| parse_mailbox(a)).collect::<Result<Vec<_>, _>>()?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            message: config.message.clone(),
            templates,
        })
    }
}

#[async_trait]
impl ChannelSender for EmailChannel {
    async fn send(&self, event: &AlertEvent, policy: &AlertPolicy) -> Result<(), ChannelError> {
        let context = alert_context(event, policy, Utc::now());
        let rendered = self.templates.render_message(self.message.as_ref(), &context)?;

        for message in build_messages(&self.from, &self.to, &rendered)? {
            self.transport.send(message).await?;
        }

        tracing::info!(
            group = %event.group,
            identifier = %event.identifier,
            recipients = self.to.len(),
            "Email alert sent."
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "localhost".into(),
            smtp_port: 1025,
            username: None,
            password: None,
            starttls: false,
            from: "Ratewatch <alerts@example.com>".into(),
            to: vec!["oncall@example.com".into(), "security@example.com".into()],
            message: None,
        }
    }

    #[test]
    fn test_build_messages_one_per_recipient() {
        let templates = TemplateService::new();
        let event = AlertEvent::new("login", "ip-1", 6);
        let policy = AlertPolicy::new("login", Severity::High);
        let rendered = templates
            .render_message(None, &alert_context(&event, &policy, Utc::now()))
            .unwrap();

        let from = parse_mailbox("alerts@example.com").unwrap();
        let to = vec![parse_mailbox("a@example.com").unwrap(), parse_mailbox("b@example.com").unwrap()];
        let messages = build_messages(&from, &to, &rendered).unwrap();

        assert_eq!(messages.len(), 2);
        let raw = String::from_utf8(messages[1].formatted()).unwrap();
        assert!(raw.contains("To: b@example.com"));
        assert!(raw.contains("Subject: [HIGH] Rate limit alert: login"));
        assert!(raw.contains("6 requests from ip-1"));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let config = EmailConfig { to: vec!["not an address".into()], ..config() };
        let result = EmailChannel::new(&config, Arc::new(TemplateService::new()));
        assert!(matches!(result, Err(ChannelError::InvalidAddress(a)) if a == "not an address"));
    }

    #[tokio::test]
    async fn test_channel_builds_from_config() {
        assert!(EmailChannel::new(&config(), Arc::new(TemplateService::new())).is_ok());
    }
}
