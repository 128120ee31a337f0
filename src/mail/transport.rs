//! Mail transport abstraction.
//!
//! The dispatcher depends only on a two-outcome contract: the transport either
//! confirms hand-off or returns an error. SMTP or provider APIs live behind
//! implementations of [`MailTransport`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use super::DeliveryRequest;

/// Errors a mail transport may report.
///
/// The dispatcher collapses all of these to a failed outcome; the variant only
/// shows up in logs and metrics. The shipped transports only produce
/// `InvalidAddress`; the other variants are for SMTP or provider-API
/// implementations.
#[derive(Debug, Error)]
pub enum MailTransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to compose message: {0}")]
    Compose(String),

    #[error("message rejected: {0}")]
    Rejected(String),
}

impl MailTransportError {
    /// Short label used in log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            MailTransportError::Connection(_) => "connection",
            MailTransportError::Authentication(_) => "authentication",
            MailTransportError::InvalidAddress(_) => "invalid_address",
            MailTransportError::Compose(_) => "compose",
            MailTransportError::Rejected(_) => "rejected",
        }
    }
}

/// Hands composed messages to an outbound mail system.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Compose and hand off one message.
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), MailTransportError>;

    /// Transport name for logs
    fn name(&self) -> &'static str;
}

/// Transport that only logs the hand-off. Used when no real mail system is
/// configured.
pub struct LogMailTransport {
    from: String,
}

impl LogMailTransport {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), MailTransportError> {
        if request.recipient.trim().is_empty() {
            return Err(MailTransportError::InvalidAddress(
                "recipient is empty".to_string(),
            ));
        }

        tracing::info!(
            request_id = %request.id,
            from = %self.from,
            recipient = %request.recipient,
            subject = %request.subject,
            content_type = request.format.content_type(),
            body_len = request.body.len(),
            "Mail handed off"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// A message captured by [`MemoryMailTransport`]
#[derive(Debug, Clone)]
pub struct SentMail {
    pub from: String,
    pub request: DeliveryRequest,
    pub sent_at: DateTime<Utc>,
}

/// Transport that keeps every accepted message in memory.
///
/// Meant for tests and local runs. Address validation is only a check for
/// `@`; anything else is accepted.
pub struct MemoryMailTransport {
    from: String,
    outbox: Mutex<Vec<SentMail>>,
}

impl MemoryMailTransport {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Messages accepted so far, in hand-off order
    pub async fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().await.clone()
    }

    /// Remove and return all captured messages
    pub async fn drain(&self) -> Vec<SentMail> {
        std::mem::take(&mut *self.outbox.lock().await)
    }
}

#[async_trait]
impl MailTransport for MemoryMailTransport {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), MailTransportError> {
        if !request.recipient.contains('@') {
            return Err(MailTransportError::InvalidAddress(request.recipient.clone()));
        }

        self.outbox.lock().await.push(SentMail {
            from: self.from.clone(),
            request: request.clone(),
            sent_at: Utc::now(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_captures_messages() {
        let transport = MemoryMailTransport::new("noreply@example.com");
        let request = DeliveryRequest::html("bob@example.com", "Welcome", "<b>hi</b>");

        transport.deliver(&request).await.unwrap();

        let sent = transport.drain().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "noreply@example.com");
        assert_eq!(sent[0].request.recipient, "bob@example.com");
        assert!(sent[0].request.is_html());
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_transport_rejects_malformed_address() {
        let transport = MemoryMailTransport::new("noreply@example.com");
        let err = transport
            .deliver(&DeliveryRequest::plain("bob", "s", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_address");
    }

    #[tokio::test]
    async fn test_log_transport_rejects_empty_recipient() {
        let transport = LogMailTransport::new("noreply@example.com");
        assert!(transport
            .deliver(&DeliveryRequest::plain("a@example.com", "s", "b"))
            .await
            .is_ok());
        assert!(transport
            .deliver(&DeliveryRequest::plain(" ", "s", "b"))
            .await
            .is_err());
    }
}
