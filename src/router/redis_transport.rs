use std::sync::Arc;

use async_trait::async_trait;

use crate::redis::{PoolError, RedisPool};

use super::{BroadcastError, BroadcastTransport, NotificationEnvelope};

/// Publishes each payload with `PUBLISH <address> <payload-json>`.
///
/// Subscribers (gateways holding client connections) listen on the address
/// channels; fan-out to them is Redis's job.
pub struct RedisBroadcastTransport {
    pool: Arc<RedisPool>,
}

impl RedisBroadcastTransport {
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<RedisPool> {
        &self.pool
    }
}

#[async_trait]
impl BroadcastTransport for RedisBroadcastTransport {
    async fn push(&self, envelope: &NotificationEnvelope) -> Result<(), BroadcastError> {
        let body = serde_json::to_string(&envelope.payload)?;

        let receivers = self
            .pool
            .publish(envelope.address.as_str(), &body)
            .await
            .map_err(|e| match e {
                PoolError::CircuitOpen => {
                    BroadcastError::Unavailable("redis circuit breaker is open".to_string())
                }
                PoolError::Redis(e) => BroadcastError::Publish(e.to_string()),
            })?;

        tracing::debug!(
            address = %envelope.address,
            receivers = receivers,
            "Published to Redis"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
