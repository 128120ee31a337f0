mod settings;

pub use settings::{
    BroadcastConfig, LogConfig, LogFormat, MailConfig, OtelConfig, RedisConfig, RouterConfig,
    Settings,
};
