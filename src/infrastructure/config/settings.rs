use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::DispatchError;
use crate::mail::MailPoolConfig;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Mail transport backend: "log" or "memory"
    #[serde(default = "default_mail_transport")]
    pub transport: String,
    /// Sender address stamped by transports that compose full messages
    #[serde(default = "default_mail_from")]
    pub from: String,
    /// Worker pool sizing and admission policy
    #[serde(default)]
    pub pool: MailPoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Namespace for per-user private notification queues
    #[serde(default = "default_user_namespace")]
    pub user_namespace: String,
    /// Well-known channel for data-update broadcasts
    #[serde(default = "default_global_channel")]
    pub global_channel: String,
    /// Namespace for role-scoped channels
    #[serde(default = "default_role_namespace")]
    pub role_namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Broadcast transport backend: "memory" or "redis"
    #[serde(default = "default_broadcast_transport")]
    pub transport: String,
    /// Per-address buffer for the in-memory transport
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Consecutive failed publishes before the circuit breaker opens
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    /// How long an open breaker refuses publishes before probing (ms)
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,
}

/// Console log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_mail_transport() -> String {
    "log".to_string()
}

fn default_mail_from() -> String {
    "no-reply@localhost".to_string()
}

fn default_user_namespace() -> String {
    "notifications".to_string()
}

fn default_global_channel() -> String {
    "data-updates".to_string()
}

fn default_role_namespace() -> String {
    "role".to_string()
}

fn default_broadcast_transport() -> String {
    "memory".to_string()
}

fn default_channel_capacity() -> usize {
    256
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_cooldown_ms() -> u64 {
    30_000
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "notification-dispatch-core".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("mail.transport", default_mail_transport())?
            .set_default("mail.from", default_mail_from())?
            .set_default("mail.pool.max_concurrency", 8)?
            .set_default("mail.pool.queue_capacity", 1024)?
            .set_default("mail.pool.admission", "queue")?
            .set_default("router.user_namespace", default_user_namespace())?
            .set_default("router.global_channel", default_global_channel())?
            .set_default("router.role_namespace", default_role_namespace())?
            .set_default("broadcast.transport", default_broadcast_transport())?
            .set_default("broadcast.channel_capacity", 256)?
            .set_default("redis.url", default_redis_url())?
            .set_default("log.format", "pretty")?
            .set_default(
                "redis.breaker_failure_threshold",
                default_breaker_failure_threshold() as i64,
            )?
            .set_default("redis.breaker_cooldown_ms", default_breaker_cooldown_ms() as i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // NOTIFY_MAIL__POOL__MAX_CONCURRENCY, NOTIFY_REDIS__URL, ...
            .add_source(
                Environment::with_prefix("NOTIFY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the components cannot be built from.
    pub fn validate(&self) -> Result<(), DispatchError> {
        self.mail.pool.validate()?;

        if !matches!(self.mail.transport.as_str(), "log" | "memory") {
            return Err(DispatchError::InvalidConfig(format!(
                "unknown mail transport '{}'",
                self.mail.transport
            )));
        }
        if !matches!(self.broadcast.transport.as_str(), "memory" | "redis") {
            return Err(DispatchError::InvalidConfig(format!(
                "unknown broadcast transport '{}'",
                self.broadcast.transport
            )));
        }
        if self.redis.breaker_failure_threshold == 0 {
            return Err(DispatchError::InvalidConfig(
                "redis.breaker_failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.broadcast.channel_capacity == 0 {
            return Err(DispatchError::InvalidConfig(
                "broadcast.channel_capacity must be greater than zero".to_string(),
            ));
        }

        let namespaces = [
            ("router.user_namespace", &self.router.user_namespace),
            ("router.global_channel", &self.router.global_channel),
            ("router.role_namespace", &self.router.role_namespace),
        ];
        for (key, value) in namespaces {
            if value.trim().is_empty() {
                return Err(DispatchError::InvalidConfig(format!("{} must not be empty", key)));
            }
        }

        Ok(())
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: default_mail_transport(),
            from: default_mail_from(),
            pool: MailPoolConfig::default(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            user_namespace: default_user_namespace(),
            global_channel: default_global_channel(),
            role_namespace: default_role_namespace(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            transport: default_broadcast_transport(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_cooldown_ms: default_breaker_cooldown_ms(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::AdmissionPolicy;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.mail.transport, "log");
        assert_eq!(settings.mail.pool.admission, AdmissionPolicy::Queue);
        assert_eq!(settings.router.global_channel, "data-updates");
        assert_eq!(settings.broadcast.transport, "memory");
        assert_eq!(settings.redis.url, "redis://localhost:6379");
        assert_eq!(settings.redis.breaker_failure_threshold, 5);
        assert_eq!(settings.redis.breaker_cooldown_ms, 30_000);
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_transports() {
        let mut settings = Settings::default();
        settings.mail.transport = "smtp".to_string();
        assert!(matches!(settings.validate(), Err(DispatchError::InvalidConfig(_))));

        let mut settings = Settings::default();
        settings.broadcast.transport = "stomp".to_string();
        assert!(matches!(settings.validate(), Err(DispatchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_namespace() {
        let mut settings = Settings::default();
        settings.router.role_namespace = "  ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut settings = Settings::default();
        settings.mail.pool.max_concurrency = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_breaker_threshold() {
        let mut settings = Settings::default();
        settings.redis.breaker_failure_threshold = 0;
        assert!(settings.validate().is_err());
    }
}
