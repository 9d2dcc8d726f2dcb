//! This module provides a service for rendering alert messages using the
//! minijinja templating engine.

use chrono::{DateTime, SecondsFormat, Utc};
use minijinja::Environment;
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::{AlertEvent, AlertPolicy, NotificationMessage};

/// Title used when a channel does not override it.
pub const DEFAULT_TITLE: &str = "[{{ severity_upper }}] Rate limit alert: {{ group }}";

/// Body used when a channel does not override it.
pub const DEFAULT_BODY: &str = "{{ count }} requests from {{ identifier }} in route group \
{{ group }}{% if method %} ({{ method }} {{ path or '' }}){% endif %} at {{ timestamp }}.";

/// A service for rendering templates using the minijinja templating engine.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// An error occurred while rendering the template.
    #[error("Failed to render template")]
    RenderError(#[from] minijinja::Error),
}

/// A rendered title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Rendered title.
    pub title: String,
    /// Rendered body.
    pub body: String,
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the variables available to alert templates.
///
/// Every key is always present so strict rendering never trips over an
/// optional event field; missing values are `null`.
pub fn alert_context(event: &AlertEvent, policy: &AlertPolicy, now: DateTime<Utc>) -> Value {
    let severity = policy.severity.as_str();
    json!({
        "group": event.group,
        "identifier": event.identifier,
        "count": event.count,
        "path": event.path,
        "method": event.method,
        "user_agent": event.user_agent,
        "severity": severity,
        "severity_upper": severity.to_uppercase(),
        "timestamp": event.occurred_at(now).to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

impl TemplateService {
    /// Creates a new instance of `TemplateService` that rejects undefined
    /// variables.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(&self, template_str: &str, context: &Value) -> Result<String, TemplateServiceError> {
        self.env.render_str(template_str, context).map_err(|e| {
            tracing::warn!(template = template_str, error = %e, "Failed to render template.");
            TemplateServiceError::RenderError(e)
        })
    }

    /// Renders `message`, or the default alert message when none is given.
    pub fn render_message(
        &self,
        message: Option<&NotificationMessage>,
        context: &Value,
    ) -> Result<RenderedMessage, TemplateServiceError> {
        let (title, body) = match message {
            Some(m) => (m.title.as_str(), m.body.as_str()),
            None => (DEFAULT_TITLE, DEFAULT_BODY),
        };
        Ok(RenderedMessage { title: self.render(title, context)?, body: self.render(body, context)? })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::Severity;

    fn context(event: &AlertEvent) -> Value {
        let policy = AlertPolicy::new("login", Severity::High);
        alert_context(event, &policy, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_default_message_renders_without_optional_fields() {
        let service = TemplateService::new();
        let rendered = service
            .render_message(None, &context(&AlertEvent::new("login", "ip-1", 6)))
            .unwrap();

        assert_eq!(rendered.title, "[HIGH] Rate limit alert: login");
        assert_eq!(
            rendered.body,
            "6 requests from ip-1 in route group login at 2024-05-01T12:00:00.000Z."
        );
    }

    #[test]
    fn test_default_message_includes_request_details() {
        let service = TemplateService::new();
        let event = AlertEvent::new("login", "ip-1", 6).with_method("POST").with_path("/auth/login");
        let rendered = service.render_message(None, &context(&event)).unwrap();

        assert!(rendered.body.contains("(POST /auth/login)"));
    }

    #[test]
    fn test_custom_message_and_strict_undefined() {
        let service = TemplateService::new();
        let ctx = context(&AlertEvent::new("login", "ip-1", 6));
        let custom = NotificationMessage { title: "{{ group }}!".into(), body: "{{ count }}".into() };

        let rendered = service.render_message(Some(&custom), &ctx).unwrap();
        assert_eq!(rendered, RenderedMessage { title: "login!".into(), body: "6".into() });

        assert!(service.render("{{ nope }}", &ctx).is_err());
    }
}
