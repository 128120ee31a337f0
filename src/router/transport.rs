//! Broadcast transport abstraction and the in-memory fan-out backend.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

use super::{Address, NotificationEnvelope};

/// Errors a broadcast transport may report.
///
/// The router logs and counts these; callers never see them.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BroadcastError {
    /// Short label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastError::Unavailable(_) => "unavailable",
            BroadcastError::Publish(_) => "publish",
            BroadcastError::Serialization(_) => "serialization",
        }
    }
}

/// Best-effort fan-out of a payload to the current subscribers of an address.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    async fn push(&self, envelope: &NotificationEnvelope) -> Result<(), BroadcastError>;

    /// Transport name for logs
    fn name(&self) -> &'static str;
}

/// In-process transport: one `tokio::sync::broadcast` channel per address.
///
/// Pushing to an address nobody subscribes to succeeds and drops the
/// envelope. Slow subscribers lag and lose the oldest envelopes once
/// `capacity` is exceeded.
pub struct MemoryBroadcastTransport {
    channels: DashMap<Address, broadcast::Sender<NotificationEnvelope>>,
    capacity: usize,
}

impl MemoryBroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, address: &Address) -> broadcast::Receiver<NotificationEnvelope> {
        self.channels
            .entry(address.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, address: &Address) -> usize {
        self.channels
            .get(address)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Addresses with a live channel
    pub fn address_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for MemoryBroadcastTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl BroadcastTransport for MemoryBroadcastTransport {
    async fn push(&self, envelope: &NotificationEnvelope) -> Result<(), BroadcastError> {
        // Clone the sender out so no map guard is held across remove_if
        let sender = self.channels.get(&envelope.address).map(|tx| tx.value().clone());

        let delivered = match sender {
            Some(tx) => match tx.send(envelope.clone()) {
                Ok(receivers) => receivers,
                Err(_) => {
                    self.channels
                        .remove_if(&envelope.address, |_, tx| tx.receiver_count() == 0);
                    0
                }
            },
            None => 0,
        };

        tracing::trace!(
            address = %envelope.address,
            receivers = delivered,
            "Envelope fanned out"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Destination;

    fn envelope(address: &Address) -> NotificationEnvelope {
        NotificationEnvelope::new(
            Destination::Global,
            address.clone(),
            serde_json::json!({"n": 1}),
        )
    }

    #[tokio::test]
    async fn test_fan_out_to_all_subscribers() {
        let transport = MemoryBroadcastTransport::new(8);
        let address = Address::new("data-updates");
        let mut a = transport.subscribe(&address);
        let mut b = transport.subscribe(&address);
        assert_eq!(transport.subscriber_count(&address), 2);

        transport.push(&envelope(&address)).await.unwrap();

        assert_eq!(a.recv().await.unwrap().payload["n"], 1);
        assert_eq!(b.recv().await.unwrap().payload["n"], 1);
    }

    #[tokio::test]
    async fn test_addresses_are_isolated() {
        let transport = MemoryBroadcastTransport::new(8);
        let mut other = transport.subscribe(&Address::new("role:ADMIN"));

        transport
            .push(&envelope(&Address::new("role:USER")))
            .await
            .unwrap();

        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_push_without_subscribers_succeeds_and_cleans_up() {
        let transport = MemoryBroadcastTransport::new(8);
        let address = Address::new("notifications:user:1");

        assert!(transport.push(&envelope(&address)).await.is_ok());

        drop(transport.subscribe(&address));
        assert_eq!(transport.address_count(), 1);
        assert!(transport.push(&envelope(&address)).await.is_ok());
        assert_eq!(transport.address_count(), 0);
    }
}
