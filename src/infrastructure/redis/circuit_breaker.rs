//! Circuit breaker in front of Redis `PUBLISH`.
//!
//! After `failure_threshold` consecutive failed publishes the breaker opens for
//! `cooldown`. Once the cooldown has passed exactly one caller is let through
//! as a probe; its result either closes the breaker or starts a new cooldown.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::RedisConfig;
use crate::metrics::RedisMetrics;

/// Sentinel for "not open" in `open_until_ms`
const CLOSED: u64 = 0;

/// Breaker states as reported to callers and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    /// Cooldown elapsed, next publish is a probe
    HalfOpen = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl From<&RedisConfig> for CircuitBreakerConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            failure_threshold: config.breaker_failure_threshold,
            cooldown: Duration::from_millis(config.breaker_cooldown_ms),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&RedisConfig::default())
    }
}

pub struct CircuitBreaker {
    /// Clock origin for `open_until_ms`
    epoch: Instant,
    /// Offset from `epoch` at which the cooldown ends, `CLOSED` when closed
    open_until_ms: AtomicU64,
    consecutive_failures: AtomicU32,
    probing: AtomicBool,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            epoch: Instant::now(),
            open_until_ms: AtomicU64::new(CLOSED),
            consecutive_failures: AtomicU32::new(0),
            probing: AtomicBool::new(false),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        match self.open_until_ms.load(Ordering::Acquire) {
            CLOSED => CircuitState::Closed,
            until if self.now_ms() < until => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    /// Whether a publish may go to Redis now.
    ///
    /// In half-open state only the caller that wins the probe slot gets
    /// `true`; everyone else is refused until the probe reports back.
    pub fn try_acquire(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                let won = self
                    .probing
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if won {
                    RedisMetrics::set_circuit_state(CircuitState::HalfOpen);
                    tracing::info!("Redis circuit breaker half-open, sending probe publish");
                }
                won
            }
        }
    }

    pub fn on_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        let was_open = self.open_until_ms.swap(CLOSED, Ordering::AcqRel) != CLOSED;
        self.probing.store(false, Ordering::Release);
        if was_open {
            RedisMetrics::set_circuit_state(CircuitState::Closed);
            tracing::info!("Redis circuit breaker closed");
        }
    }

    pub fn on_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        let probe_failed = self.probing.swap(false, Ordering::AcqRel);

        if probe_failed || failures >= self.config.failure_threshold {
            let until = self.now_ms() + self.config.cooldown.as_millis() as u64;
            // Never store the sentinel, even for a zero cooldown at startup
            self.open_until_ms.store(until.max(1), Ordering::Release);
            RedisMetrics::set_circuit_state(CircuitState::Open);
            tracing::warn!(
                consecutive_failures = failures,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "Redis circuit breaker opened"
            );
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
