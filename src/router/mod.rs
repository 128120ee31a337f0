//! Destination-routed broadcasts.
//!
//! [`NotificationRouter`] turns a [`Destination`] into an [`Address`] through
//! the configured [`AddressScheme`] and pushes the payload through a
//! [`BroadcastTransport`]. Transport failures are logged and counted, never
//! returned.
//!
//! Transports:
//!
//! - `MemoryBroadcastTransport`: in-process channels per address (default)
//! - `RedisBroadcastTransport`: Redis `PUBLISH`
//!
//! Use `create_broadcast_transport()` to build the one named in configuration.

mod destination;
mod envelope;
mod redis_transport;
mod routing;
mod transport;

use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::redis::RedisPool;

pub use destination::{normalize_role, Address, AddressScheme, Destination};
pub use envelope::{DataUpdate, NotificationEnvelope};
pub use redis_transport::RedisBroadcastTransport;
pub use routing::{NotificationRouter, RouterStats, RouterStatsSnapshot};
pub use transport::{BroadcastError, BroadcastTransport, MemoryBroadcastTransport};

/// Create the broadcast transport named by `settings.broadcast.transport`.
///
/// - `"redis"`: `RedisBroadcastTransport` on a pool built from `settings.redis`
/// - `"memory"` (default): `MemoryBroadcastTransport`
pub fn create_broadcast_transport(settings: &Settings) -> Result<Arc<dyn BroadcastTransport>> {
    match settings.broadcast.transport.as_str() {
        "redis" => {
            let pool = RedisPool::new(&settings.redis)?;
            tracing::info!(
                transport = "redis",
                url = %pool.url(),
                "Creating Redis broadcast transport"
            );
            Ok(Arc::new(RedisBroadcastTransport::new(Arc::new(pool))))
        }
        other => {
            if other != "memory" {
                tracing::warn!(transport = %other, "Unknown broadcast transport, falling back to memory");
            }
            tracing::info!(
                transport = "memory",
                capacity = settings.broadcast.channel_capacity,
                "Creating memory broadcast transport"
            );
            Ok(Arc::new(MemoryBroadcastTransport::new(
                settings.broadcast.channel_capacity,
            )))
        }
    }
}
