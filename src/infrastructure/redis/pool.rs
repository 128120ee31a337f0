//! Shared Redis connection for publishing broadcasts.

use std::future::Future;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;
use crate::metrics::RedisMetrics;

use super::{CircuitBreaker, CircuitBreakerConfig};

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

/// Multiplexed Redis connection guarded by a circuit breaker.
///
/// The connection is opened lazily on first use and dropped after an I/O
/// error so the next command reconnects.
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: CircuitBreaker,
    url: String,
}

impl RedisPool {
    /// Build the client without connecting; breaker thresholds come from
    /// `config.breaker_*`.
    pub fn new(config: &RedisConfig) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::from(config)),
            url: config.url.clone(),
        })
    }

    /// Get the shared connection, connecting if necessary.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.try_acquire() {
            return Err(PoolError::CircuitOpen);
        }

        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                self.circuit_breaker.on_success();
                self.set_connected(true);
                tracing::info!(url = %self.url, "Redis connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.on_failure();
                self.set_connected(false);
                tracing::error!(url = %self.url, error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command against the shared connection, recording the outcome on
    /// the circuit breaker.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.circuit_breaker.on_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                    self.set_connected(false);
                }
                self.circuit_breaker.on_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    /// `PUBLISH channel message`, returning the number of receiving clients.
    pub async fn publish(&self, channel: &str, message: &str) -> Result<usize, PoolError> {
        let channel = channel.to_string();
        let message = message.to_string();
        self.execute(move |mut conn| async move { conn.publish(channel, message).await })
            .await
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn set_connected(&self, connected: bool) {
        RedisMetrics::set_connected(connected);
    }
}
