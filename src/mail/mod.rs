//! Point-to-point mail delivery.
//!
//! [`AsyncMailDispatcher`] submits each message to a bounded
//! [`MailWorkerPool`] and returns a [`DeliveryHandle`] that resolves to a
//! boolean outcome. Transport failures are logged, never returned.
//!
//! Transports:
//!
//! - `LogMailTransport`: logs the hand-off (default)
//! - `MemoryMailTransport`: keeps accepted messages in memory
//!
//! Use `create_mail_transport()` to build the one named in configuration.

mod dispatcher;
mod handle;
mod pool;
mod transport;
mod types;

use std::sync::Arc;

use crate::config::MailConfig;

pub use dispatcher::{AsyncMailDispatcher, MailStats, MailStatsSnapshot};
pub use handle::DeliveryHandle;
pub use pool::{AdmissionPolicy, MailPoolConfig, MailWorkerPool, SubmitError};
pub use transport::{
    LogMailTransport, MailTransport, MailTransportError, MemoryMailTransport, SentMail,
};
pub use types::{BodyFormat, DeliveryOutcome, DeliveryRequest};

/// Create the mail transport named by `settings.transport`.
///
/// - `"memory"`: `MemoryMailTransport`
/// - `"log"` (default): `LogMailTransport`
pub fn create_mail_transport(settings: &MailConfig) -> Arc<dyn MailTransport> {
    match settings.transport.as_str() {
        "memory" => {
            tracing::info!(transport = "memory", from = %settings.from, "Creating memory mail transport");
            Arc::new(MemoryMailTransport::new(settings.from.clone()))
        }
        other => {
            if other != "log" {
                tracing::warn!(transport = %other, "Unknown mail transport, falling back to log");
            }
            tracing::info!(transport = "log", from = %settings.from, "Creating log mail transport");
            Arc::new(LogMailTransport::new(settings.from.clone()))
        }
    }
}
