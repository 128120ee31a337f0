use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the transport should interpret a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// Literal text
    #[default]
    Plain,
    /// Markup to be rendered by the recipient's client
    Html,
}

impl BodyFormat {
    /// MIME content type matching the format
    pub fn content_type(&self) -> &'static str {
        match self {
            BodyFormat::Plain => "text/plain; charset=utf-8",
            BodyFormat::Html => "text/html; charset=utf-8",
        }
    }
}

/// A point-to-point message handed to the mail transport.
///
/// Immutable once submitted; the worker that delivers it owns it until the
/// outcome is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Correlates log lines for one delivery
    pub id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub format: BodyFormat,
    pub submitted_at: DateTime<Utc>,
}

impl DeliveryRequest {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        format: BodyFormat,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            format,
            submitted_at: Utc::now(),
        }
    }

    pub fn plain(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(recipient, subject, body, BodyFormat::Plain)
    }

    pub fn html(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Self {
        Self::new(recipient, subject, html_body, BodyFormat::Html)
    }

    pub fn is_html(&self) -> bool {
        self.format == BodyFormat::Html
    }
}

/// Result of a mail delivery as seen by the caller.
///
/// Failure detail is logged, never carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
}

impl DeliveryOutcome {
    pub fn delivered() -> Self {
        Self { success: true }
    }

    pub fn failed() -> Self {
        Self { success: false }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl From<DeliveryOutcome> for bool {
    fn from(outcome: DeliveryOutcome) -> Self {
        outcome.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_constructors_set_format() {
        let plain = DeliveryRequest::plain("a@example.com", "Hi", "text");
        assert_eq!(plain.format, BodyFormat::Plain);
        assert!(!plain.is_html());

        let html = DeliveryRequest::html("a@example.com", "Hi", "<p>text</p>");
        assert!(html.is_html());
        assert_eq!(html.format.content_type(), "text/html; charset=utf-8");
        assert_ne!(plain.id, html.id);
    }

    #[test]
    fn test_outcome_into_bool() {
        assert!(bool::from(DeliveryOutcome::delivered()));
        assert!(!bool::from(DeliveryOutcome::failed()));
    }
}
