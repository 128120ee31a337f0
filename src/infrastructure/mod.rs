//! Infrastructure layer modules
//!
//! Shared components used by the mail and broadcast halves:
//! - `config`: Application configuration and settings
//! - `error`: Construction-time error types
//! - `metrics`: Prometheus metrics helpers
//! - `redis`: Redis connection pool and circuit breaker

pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
