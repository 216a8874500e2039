//! Configuration for BRM

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "BRM_CONFIG";

/// Prefix of environment overrides, e.g. `BRM__SERVER__PORT=9000`
const ENV_PREFIX: &str = "BRM";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend: only "sqlite" is supported
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL, e.g. `sqlite://brm.db` or `sqlite::memory:`
    pub url: Option<String>,

    /// Database file path, used when no URL is given
    pub path: Option<PathBuf>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Pool acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Upper bound for a single write transaction in milliseconds
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            url: None,
            path: Some(default_db_path()),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            transaction_timeout_ms: default_transaction_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            url: Some("sqlite::memory:".to_string()),
            path: None,
            max_connections: 1,
            min_connections: 1,
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

fn default_db_backend() -> String {
    "sqlite".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("brm.db")
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_transaction_timeout() -> u64 {
    5_000
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Expose `/metrics` and record request durations
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file, with environment overrides applied
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        Self::build(Some(path))
    }

    /// Load configuration from environment and file
    ///
    /// The file is taken from `BRM_CONFIG` when set, otherwise from the first
    /// default location that exists. A missing file is not an error: every
    /// setting has a default.
    pub fn load() -> crate::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let paths = [
            PathBuf::from("./brm.toml"),
            PathBuf::from("/etc/brm/brm.toml"),
        ];

        let found = paths.iter().find(|p| p.exists());
        Self::build(found.map(|p| p.as_path()))
    }

    fn build(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))
    }
}
