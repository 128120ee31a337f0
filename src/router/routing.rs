use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::metrics::BroadcastMetrics;

use super::{AddressScheme, BroadcastTransport, DataUpdate, Destination, NotificationEnvelope};

/// Statistics for the notification router
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Pushes the transport accepted
    pub pushed: AtomicU64,
    /// Pushes the transport failed
    pub failed: AtomicU64,
    /// Calls dropped for a missing destination identifier
    pub skipped: AtomicU64,
}

impl RouterStats {
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of router statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    pub pushed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Resolves destinations to addresses and pushes payloads through the
/// broadcast transport.
///
/// All operations return `()`: a missing target is a no-op and a transport
/// failure is logged and counted, then swallowed.
pub struct NotificationRouter {
    transport: Arc<dyn BroadcastTransport>,
    scheme: AddressScheme,
    stats: RouterStats,
}

impl NotificationRouter {
    pub fn new(transport: Arc<dyn BroadcastTransport>, scheme: AddressScheme) -> Self {
        Self {
            transport,
            scheme,
            stats: RouterStats::default(),
        }
    }

    pub fn stats(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn scheme(&self) -> &AddressScheme {
        &self.scheme
    }

    /// Push `payload` to one user's private notification queue.
    pub async fn send_notification(&self, user_id: Option<i64>, payload: serde_json::Value) {
        match Destination::user(user_id) {
            Some(destination) => self.route(destination, payload).await,
            None => self.skip("user"),
        }
    }

    /// Tell every subscriber of the global channel that `entity` changed.
    pub async fn broadcast_data_update(&self, entity: &str, id: Option<i64>, action: &str) {
        let update = DataUpdate::new(entity, id, action);

        tracing::info!(
            entity = %update.entity,
            id = update.id,
            action = %update.action,
            "Broadcasting data update"
        );

        match update.to_payload() {
            Ok(payload) => self.route(Destination::Global, payload).await,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                BroadcastMetrics::record_failed("global");
                tracing::error!(
                    entity = %update.entity,
                    action = %update.action,
                    error = %e,
                    "Failed to serialize data update"
                );
            }
        }
    }

    /// Push `payload` to everyone holding `role`.
    pub async fn broadcast_to_role(&self, role: Option<&str>, payload: serde_json::Value) {
        match Destination::role(role) {
            Some(destination) => self.route(destination, payload).await,
            None => self.skip("role"),
        }
    }

    /// Resolve `destination` and push `payload` to it.
    #[tracing::instrument(
        name = "router.route",
        skip(self, destination, payload),
        fields(destination = %destination, transport = self.transport.name())
    )]
    pub async fn route(&self, destination: Destination, payload: serde_json::Value) {
        let kind = destination.kind();
        if !destination.is_addressable() {
            self.skip(kind);
            return;
        }

        let address = self.scheme.resolve(&destination);
        tracing::info!(address = %address, kind = kind, "Pushing notification");

        let envelope = NotificationEnvelope::new(destination, address, payload);

        match self.transport.push(&envelope).await {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                BroadcastMetrics::record_pushed(kind);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                BroadcastMetrics::record_failed(kind);
                tracing::error!(
                    address = %envelope.address,
                    destination = %envelope.destination,
                    envelope_id = %envelope.id,
                    kind = e.kind(),
                    error = %e,
                    "Failed to push notification"
                );
            }
        }
    }

    fn skip(&self, kind: &'static str) {
        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
        BroadcastMetrics::record_skipped(kind);
        tracing::debug!(kind = kind, "No destination identifier, nothing to push");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Address, BroadcastError, MemoryBroadcastTransport};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Records every pushed envelope
    #[derive(Default)]
    struct RecordingTransport {
        pushed: Mutex<Vec<NotificationEnvelope>>,
    }

    #[async_trait]
    impl BroadcastTransport for RecordingTransport {
        async fn push(&self, envelope: &NotificationEnvelope) -> Result<(), BroadcastError> {
            self.pushed.lock().await.push(envelope.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct DeadTransport;

    #[async_trait]
    impl BroadcastTransport for DeadTransport {
        async fn push(&self, _envelope: &NotificationEnvelope) -> Result<(), BroadcastError> {
            Err(BroadcastError::Unavailable("broker down".to_string()))
        }

        fn name(&self) -> &'static str {
            "dead"
        }
    }

    fn recording_router() -> (Arc<RecordingTransport>, NotificationRouter) {
        let transport = Arc::new(RecordingTransport::default());
        let router = NotificationRouter::new(transport.clone(), AddressScheme::default());
        (transport, router)
    }

    #[tokio::test]
    async fn test_send_notification_pushes_payload_unmodified() {
        let (transport, router) = recording_router();
        let payload = json!({"title": "New comment", "nested": {"a": [1, 2]}});

        router.send_notification(Some(42), payload.clone()).await;

        let pushed = transport.pushed.lock().await;
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].address.as_str(), "notifications:user:42");
        assert_eq!(pushed[0].payload, payload);
    }

    #[tokio::test]
    async fn test_missing_identifiers_push_nothing() {
        let (transport, router) = recording_router();

        router.send_notification(None, json!({})).await;
        router.broadcast_to_role(None, json!({})).await;
        router.broadcast_to_role(Some(""), json!({})).await;
        router.route(Destination::Role("  ".into()), json!({})).await;

        assert!(transport.pushed.lock().await.is_empty());
        assert_eq!(router.stats().skipped, 4);
        assert_eq!(router.stats().pushed, 0);
    }

    #[tokio::test]
    async fn test_role_addresses_are_normalised() {
        let (transport, router) = recording_router();

        router.broadcast_to_role(Some("team lead"), json!({})).await;
        router.broadcast_to_role(Some("TEAM LEAD"), json!({})).await;
        router.broadcast_to_role(Some("teamlead"), json!({})).await;

        let pushed = transport.pushed.lock().await;
        assert_eq!(pushed[0].address, pushed[1].address);
        assert_ne!(pushed[0].address, pushed[2].address);
        assert_eq!(pushed[0].address, Address::new("role:TEAM_LEAD"));
    }

    #[tokio::test]
    async fn test_data_update_goes_to_global_channel() {
        let (transport, router) = recording_router();
        let before = chrono::Utc::now().timestamp_millis();

        router.broadcast_data_update("Order", Some(42), "UPDATED").await;
        router.broadcast_data_update("Order", None, "CREATED").await;

        let pushed = transport.pushed.lock().await;
        assert_eq!(pushed[0].address.as_str(), "data-updates");
        assert_eq!(pushed[0].payload["entity"], "Order");
        assert_eq!(pushed[0].payload["id"], 42);
        assert_eq!(pushed[0].payload["action"], "UPDATED");
        assert!(pushed[0].payload["timestamp"].as_i64().unwrap() >= before);
        assert_eq!(pushed[1].payload["id"], 0);
        assert_eq!(pushed[1].payload["action"], "CREATED");
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed_and_counted() {
        let router = NotificationRouter::new(Arc::new(DeadTransport), AddressScheme::default());

        for _ in 0..3 {
            router.send_notification(Some(1), json!({})).await;
            router.broadcast_data_update("Order", Some(1), "DELETED").await;
            router.broadcast_to_role(Some("admin"), json!({})).await;
        }

        let stats = router.stats();
        assert_eq!(stats.failed, 9);
        assert_eq!(stats.pushed, 0);
    }

    #[tokio::test]
    async fn test_memory_transport_delivers_to_subscriber() {
        let transport = Arc::new(MemoryBroadcastTransport::new(16));
        let router = NotificationRouter::new(transport.clone(), AddressScheme::default());
        let mut inbox = transport.subscribe(&router.scheme().resolve(&Destination::User(9)));

        router.send_notification(Some(9), json!({"ping": true})).await;

        let envelope = inbox.recv().await.unwrap();
        assert_eq!(envelope.destination, Destination::User(9));
        assert_eq!(envelope.payload["ping"], true);
    }
}
