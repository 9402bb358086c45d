//! Index connection configuration

use crate::search::schema::Entity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the connection to the search cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the cluster
    #[serde(default = "default_url")]
    pub url: String,

    /// Environment variable holding the basic-auth username
    #[serde(default)]
    pub username_env: Option<String>,

    /// Environment variable holding the basic-auth password
    #[serde(default)]
    pub password_env: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Retries for idempotent reads on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Skip TLS certificate verification (self-signed dev clusters)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Accept gzip-compressed responses
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Ask the engine for highlighted fragments on message searches
    #[serde(default = "default_true")]
    pub enable_highlighting: bool,

    /// Ping the cluster before each search and fail fast when unreachable
    #[serde(default = "default_true")]
    pub preflight_ping: bool,

    #[serde(default = "default_conversations_index")]
    pub conversations_index: String,

    #[serde(default = "default_messages_index")]
    pub messages_index: String,
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_conversations_index() -> String {
    "conversations".to_string()
}

fn default_messages_index() -> String {
    "messages".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username_env: None,
            password_env: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            accept_invalid_certs: false,
            compression: true,
            enable_highlighting: true,
            preflight_ping: true,
            conversations_index: default_conversations_index(),
            messages_index: default_messages_index(),
        }
    }
}

impl IndexConfig {
    /// Name of the index holding documents of `entity`
    pub fn index_name(&self, entity: Entity) -> &str {
        match entity {
            Entity::Conversation => &self.conversations_index,
            Entity::Message => &self.messages_index,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Basic-auth credentials resolved from the configured env vars
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = std::env::var(self.username_env.as_ref()?).ok()?;
        let password = self
            .password_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default();
        Some((username, password))
    }
}

/// Builder for IndexConfig
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexConfig::default(),
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.config.accept_invalid_certs = enabled;
        self
    }

    pub fn enable_highlighting(mut self, enabled: bool) -> Self {
        self.config.enable_highlighting = enabled;
        self
    }

    pub fn preflight_ping(mut self, enabled: bool) -> Self {
        self.config.preflight_ping = enabled;
        self
    }

    pub fn index_names(
        mut self,
        conversations: impl Into<String>,
        messages: impl Into<String>,
    ) -> Self {
        self.config.conversations_index = conversations.into();
        self.config.messages_index = messages.into();
        self
    }

    pub fn build(self) -> IndexConfig {
        self.config
    }
}

impl Default for IndexConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
