//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BackendKind, ChannelConfig, ConfigError, Environment, FanoutConfig,
    HistoryConfig, RedisConfig, StorageConfig,
};
