use thiserror::Error;

use crate::infrastructure::redis::pool::PoolError;
use crate::telemetry::TelemetryError;

/// Errors raised while building the dispatch core.
///
/// None of these surface from the public send/broadcast operations; they are
/// returned only from constructors, factories and settings loading.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Redis pool error: {0}")]
    RedisPool(#[from] PoolError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
