use crate::search::IndexConfig;
use serde::{Deserialize, Serialize};

/// Embedded defaults; every other source only overrides these
const DEFAULTS: &str = include_str!("../config/default.toml");

/// Environment override prefix, e.g. `THREADSEEK__INDEX__URL`
const ENV_PREFIX: &str = "THREADSEEK";

/// Process configuration for the server binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Search cluster connection and index layout
    pub index: IndexConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Layer embedded defaults, an optional TOML file (`$CONFIG_PATH`,
    /// default `config/threadseek.toml`) and `THREADSEEK__*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/threadseek.toml".to_string());

        Self::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
    }

    /// Socket address string the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

/// Log output settings; `RUST_LOG` still wins over `log_level`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// One JSON object per line instead of human-readable output
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
