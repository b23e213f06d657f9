//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). Values are validated once at startup.

use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub channel: ChannelConfig,
    pub storage: StorageConfig,
    pub backend: BackendKind,
    pub redis: Option<RedisConfig>,
    pub fanout: FanoutConfig,
    pub history: HistoryConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Which distribution backend carries fan-out, history, and attachment lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Single process, in-memory
    #[default]
    Local,
    /// Redis pub/sub and lists
    Redis,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "standalone" => Ok(Self::Local),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::InvalidValue("BACKEND", other.to_string())),
        }
    }
}

/// Channel lifecycle configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Time-to-live of every channel, in seconds
    pub ttl_secs: u64,
}

impl ChannelConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// File storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: String,
    /// Remove leftovers from a previous run at startup
    pub purge_on_startup: bool,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Local fan-out configuration
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Per-subscriber buffer before the oldest messages are dropped
    pub buffer: usize,
}

/// History configuration
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Messages retained per channel
    pub max_messages: usize,
    /// Default page returned by a plain listing
    pub page_size: usize,
}

// Default value functions
fn default_app_name() -> String {
    "ephemera".to_string()
}

fn default_channel_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_storage_root() -> String {
    "./filestorage".to_string()
}

fn default_purge_on_startup() -> bool {
    true
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_fanout_buffer() -> usize {
    1024
}

fn default_history_max_messages() -> usize {
    1000
}

fn default_history_page_size() -> usize {
    15
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup("BACKEND") {
            Some(raw) => raw.parse()?,
            None => BackendKind::default(),
        };

        let redis = match lookup("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_var(&lookup, "REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
            }),
            None if backend == BackendKind::Redis => {
                return Err(ConfigError::MissingVar("REDIS_URL"));
            }
            None => None,
        };

        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: match lookup("APP_ENV") {
                    Some(raw) => raw.parse()?,
                    None => Environment::default(),
                },
            },
            channel: ChannelConfig {
                ttl_secs: parse_var(&lookup, "CHANNEL_TTL_SECS")?
                    .unwrap_or_else(default_channel_ttl),
            },
            storage: StorageConfig {
                root: lookup("FILE_STORAGE_ROOT").unwrap_or_else(default_storage_root),
                purge_on_startup: parse_var(&lookup, "PURGE_ON_STARTUP")?
                    .unwrap_or_else(default_purge_on_startup),
            },
            backend,
            redis,
            fanout: FanoutConfig {
                buffer: parse_var(&lookup, "FANOUT_BUFFER")?.unwrap_or_else(default_fanout_buffer),
            },
            history: HistoryConfig {
                max_messages: parse_var(&lookup, "HISTORY_MAX_MESSAGES")?
                    .unwrap_or_else(default_history_max_messages),
                page_size: parse_var(&lookup, "HISTORY_PAGE_SIZE")?
                    .unwrap_or_else(default_history_page_size),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration suitable for a single in-process node
    #[must_use]
    pub fn local(storage_root: impl Into<String>, ttl: Duration) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::Development,
            },
            channel: ChannelConfig {
                ttl_secs: ttl.as_secs().max(1),
            },
            storage: StorageConfig {
                root: storage_root.into(),
                purge_on_startup: false,
            },
            backend: BackendKind::Local,
            redis: None,
            fanout: FanoutConfig {
                buffer: default_fanout_buffer(),
            },
            history: HistoryConfig {
                max_messages: default_history_max_messages(),
                page_size: default_history_page_size(),
            },
        }
    }

    /// Check invariants that cannot be expressed by the types
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue("CHANNEL_TTL_SECS", "0".to_string()));
        }
        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::InvalidValue("FILE_STORAGE_ROOT", String::new()));
        }
        if self.fanout.buffer == 0 {
            return Err(ConfigError::InvalidValue("FANOUT_BUFFER", "0".to_string()));
        }
        if self.history.max_messages == 0 {
            return Err(ConfigError::InvalidValue("HISTORY_MAX_MESSAGES", "0".to_string()));
        }
        if self.backend == BackendKind::Redis && self.redis.is_none() {
            return Err(ConfigError::MissingVar("REDIS_URL"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
