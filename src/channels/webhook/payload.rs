//! Chat-service payloads for the webhook channels.
//!
//! Each service has its own JSON shape. A builder turns the rendered message
//! plus a handful of alert facts into that shape.

use serde_json::{Value, json};

use crate::channels::template::RenderedMessage;

/// Facts shown alongside the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFacts {
    /// Offending entity.
    pub identifier: String,
    /// Occurrences observed.
    pub count: u64,
    /// Alert group.
    pub group: String,
    /// Upper-cased severity.
    pub severity: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl AlertFacts {
    fn pairs(&self) -> [(&'static str, String); 5] {
        [
            ("Identifier", self.identifier.clone()),
            ("Requests", self.count.to_string()),
            ("Route Group", self.group.clone()),
            ("Severity", self.severity.clone()),
            ("Timestamp", self.timestamp.clone()),
        ]
    }
}

/// A trait for building channel-specific webhook payloads.
pub trait WebhookPayloadBuilder: Send + Sync {
    /// Builds the JSON body posted to the webhook.
    fn build_payload(&self, message: &RenderedMessage, facts: &AlertFacts) -> Value;
}

/// Slack incoming-webhook payload using `blocks`.
pub struct SlackPayloadBuilder;

impl WebhookPayloadBuilder for SlackPayloadBuilder {
    fn build_payload(&self, message: &RenderedMessage, facts: &AlertFacts) -> Value {
        let fields: Vec<Value> = facts
            .pairs()
            .into_iter()
            .map(|(name, value)| json!({ "type": "mrkdwn", "text": format!("*{name}:*\n{value}") }))
            .collect();
        json!({
            "text": message.title,
            "blocks": [
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!("*{}*\n\n{}", message.title, message.body)
                    }
                },
                {
                    "type": "section",
                    "fields": fields
                }
            ]
        })
    }
}

/// Microsoft Teams payload wrapping an Adaptive Card 1.4.
pub struct TeamsPayloadBuilder;

impl WebhookPayloadBuilder for TeamsPayloadBuilder {
    fn build_payload(&self, message: &RenderedMessage, facts: &AlertFacts) -> Value {
        let facts: Vec<Value> = facts
            .pairs()
            .into_iter()
            .map(|(name, value)| json!({ "title": format!("{name}:"), "value": value }))
            .collect();
        json!({
            "type": "message",
            "attachments": [
                {
                    "contentType": "application/vnd.microsoft.card.adaptive",
                    "content": {
                        "type": "AdaptiveCard",
                        "body": [
                            {
                                "type": "TextBlock",
                                "text": message.title,
                                "weight": "Bolder",
                                "size": "Medium",
                                "color": "Attention"
                            },
                            { "type": "TextBlock", "text": message.body, "wrap": true },
                            { "type": "FactSet", "facts": facts }
                        ],
                        "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                        "version": "1.4"
                    }
                }
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> AlertFacts {
        AlertFacts {
            identifier: "ip-1".into(),
            count: 6,
            group: "login".into(),
            severity: "HIGH".into(),
            timestamp: "2024-05-01T12:00:00.000Z".into(),
        }
    }

    fn message() -> RenderedMessage {
        RenderedMessage { title: "Alert".into(), body: "Too many requests".into() }
    }

    #[test]
    fn test_slack_payload_builder() {
        let payload = SlackPayloadBuilder.build_payload(&message(), &facts());

        assert_eq!(payload["text"], "Alert");
        assert_eq!(payload["blocks"][0]["text"]["text"], "*Alert*\n\nToo many requests");
        let fields = payload["blocks"][1]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[2]["text"], "*Route Group:*\nlogin");
    }

    #[test]
    fn test_teams_payload_builder() {
        let payload = TeamsPayloadBuilder.build_payload(&message(), &facts());

        let card = &payload["attachments"][0]["content"];
        assert_eq!(payload["attachments"][0]["contentType"], "application/vnd.microsoft.card.adaptive");
        assert_eq!(card["version"], "1.4");
        assert_eq!(card["body"][0]["text"], "Alert");
        assert_eq!(
            card["body"][2]["facts"][3],
            json!({ "title": "Severity:", "value": "HIGH" })
        );
    }
}
