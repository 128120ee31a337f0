use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;

use crate::metrics::MailMetrics;

use super::handle::OutcomeSender;
use super::{DeliveryHandle, DeliveryOutcome, DeliveryRequest, MailTransport, MailWorkerPool};

/// Statistics for the mail dispatcher
#[derive(Debug, Default)]
pub struct MailStats {
    /// Deliveries admitted to the pool
    pub submitted: AtomicU64,
    /// Deliveries the transport accepted
    pub delivered: AtomicU64,
    /// Deliveries the transport failed
    pub failed: AtomicU64,
    /// Deliveries refused at admission
    pub rejected: AtomicU64,
}

impl MailStats {
    pub fn snapshot(&self) -> MailStatsSnapshot {
        MailStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of mail dispatcher statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MailStatsSnapshot {
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub rejected: u64,
}

/// Sends point-to-point mail on a bounded worker pool.
///
/// Every call hands back a [`DeliveryHandle`]; no transport or admission
/// error ever reaches the caller as an `Err`. Failures are logged and the
/// handle resolves to `false`.
pub struct AsyncMailDispatcher {
    transport: Arc<dyn MailTransport>,
    pool: Arc<MailWorkerPool>,
    stats: Arc<MailStats>,
}

impl AsyncMailDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, pool: Arc<MailWorkerPool>) -> Self {
        Self {
            transport,
            pool,
            stats: Arc::new(MailStats::default()),
        }
    }

    pub fn stats(&self) -> MailStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn pool(&self) -> &Arc<MailWorkerPool> {
        &self.pool
    }

    /// Send a plain-text message
    pub async fn send(
        &self,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> DeliveryHandle {
        self.dispatch(DeliveryRequest::plain(recipient, subject, body))
            .await
    }

    /// Send a message whose body the transport must treat as HTML
    pub async fn send_html(
        &self,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> DeliveryHandle {
        self.dispatch(DeliveryRequest::html(recipient, subject, html_body))
            .await
    }

    /// Submit a prepared request to the worker pool
    #[tracing::instrument(
        name = "mail.dispatch",
        skip(self, request),
        fields(request_id = %request.id, recipient = %request.recipient, format = ?request.format)
    )]
    pub async fn dispatch(&self, request: DeliveryRequest) -> DeliveryHandle {
        let request_id = request.id;
        let recipient = request.recipient.clone();
        let (sender, handle) = DeliveryHandle::pending(request_id);

        let job = deliver(self.transport.clone(), self.stats.clone(), request, sender);

        match self.pool.submit(job).await {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                MailMetrics::record_submitted();
                handle
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                MailMetrics::record_rejected(e.reason());
                tracing::warn!(
                    request_id = %request_id,
                    recipient = %recipient,
                    reason = e.reason(),
                    error = %e,
                    "Mail delivery not admitted"
                );
                DeliveryHandle::resolved(request_id, DeliveryOutcome::failed())
            }
        }
    }
}

/// Worker body: run the transport and resolve the handle.
async fn deliver(
    transport: Arc<dyn MailTransport>,
    stats: Arc<MailStats>,
    request: DeliveryRequest,
    sender: OutcomeSender,
) {
    let started = Instant::now();
    MailMetrics::record_started();

    // Build the future inside the guarded block so a transport that panics
    // before returning one is caught too
    let result = AssertUnwindSafe(async { transport.deliver(&request).await })
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(())) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            MailMetrics::record_finished(started.elapsed(), None);
            tracing::debug!(
                request_id = %request.id,
                recipient = %request.recipient,
                transport = transport.name(),
                "Mail delivered"
            );
            DeliveryOutcome::delivered()
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            MailMetrics::record_finished(started.elapsed(), Some(e.kind()));
            tracing::error!(
                request_id = %request.id,
                recipient = %request.recipient,
                transport = transport.name(),
                kind = e.kind(),
                error = %e,
                "Failed to send mail"
            );
            DeliveryOutcome::failed()
        }
        Err(_) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            MailMetrics::record_finished(started.elapsed(), Some("panic"));
            tracing::error!(
                request_id = %request.id,
                recipient = %request.recipient,
                transport = transport.name(),
                "Mail transport panicked"
            );
            DeliveryOutcome::failed()
        }
    };

    sender.resolve(outcome);
}
