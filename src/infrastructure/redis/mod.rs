//! Redis client plumbing for the Redis broadcast transport.
//!
//! - `RedisPool`: shared multiplexed connection used for `PUBLISH`
//! - `CircuitBreaker`: fails publishes fast while Redis is down

mod circuit_breaker;
pub mod pool;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use pool::{PoolError, RedisPool};
