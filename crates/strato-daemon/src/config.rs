//! Daemon configuration (§6): environment variables recognized by the
//! control-plane binary, with an optional file layered underneath them.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use strato_types::SchedulingStrategyKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduling_strategy: SchedulingStrategyKind,

    #[serde(default = "default_heartbeat_window_secs")]
    pub agent_heartbeat_window_secs: u64,

    #[serde(default = "default_reservation_ttl_secs")]
    pub reservation_ttl_secs: u64,

    #[serde(default = "default_cert_max_validity_days")]
    pub cert_max_validity_days: i64,

    #[serde(default)]
    pub permission_store_endpoint: Option<String>,

    #[serde(default)]
    pub permission_store_token: Option<String>,

    #[serde(default)]
    pub image_storage_path: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            scheduling_strategy: SchedulingStrategyKind::default(),
            agent_heartbeat_window_secs: default_heartbeat_window_secs(),
            reservation_ttl_secs: default_reservation_ttl_secs(),
            cert_max_validity_days: default_cert_max_validity_days(),
            permission_store_endpoint: None,
            permission_store_token: None,
            image_storage_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Listener certificate/key presented to both REST clients and
    /// enrolled agents. Both must be set to serve TLS; left unset, the
    /// daemon falls back to plaintext HTTP, which is only appropriate
    /// behind an already-terminating proxy in development.
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    #[serde(default)]
    pub tls_key_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().unwrap(),
            enable_cors: true,
            command_timeout_secs: default_command_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

/// Storage backend. `Memory` is the development/test default; `Postgres`
/// is selected whenever `DATABASE_URL` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Postgres {
        url: String,
        #[serde(default = "default_pool_size")]
        max_connections: u32,
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_command_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_heartbeat_window_secs() -> u64 {
    60
}

fn default_reservation_ttl_secs() -> u64 {
    300
}

fn default_cert_max_validity_days() -> i64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Layers, lowest to highest precedence: built-in defaults, an
    /// optional config file, then `STRATO_`-prefixed environment
    /// variables plus the handful of bare names the spec names verbatim
    /// (`DATABASE_URL`, `SCHEDULING_STRATEGY`, ...).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STRATO")
                .separator("_")
                .try_parsing(true),
        );

        let mut config: DaemonConfig = builder.build()?.try_deserialize()?;

        if let Ok(strategy) = std::env::var("SCHEDULING_STRATEGY") {
            if let Ok(parsed) = strategy.parse() {
                config.scheduling_strategy = parsed;
            }
        }
        if let Ok(secs) = std::env::var("AGENT_HEARTBEAT_WINDOW_SECS") {
            if let Ok(parsed) = secs.parse() {
                config.agent_heartbeat_window_secs = parsed;
            }
        }
        if let Ok(secs) = std::env::var("RESERVATION_TTL_SECS") {
            if let Ok(parsed) = secs.parse() {
                config.reservation_ttl_secs = parsed;
            }
        }
        if let Ok(days) = std::env::var("CERT_MAX_VALIDITY_DAYS") {
            if let Ok(parsed) = days.parse() {
                config.cert_max_validity_days = parsed;
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.storage = StorageConfig::Postgres {
                    url,
                    max_connections: default_pool_size(),
                    connect_timeout_secs: default_connection_timeout(),
                };
            }
        }
        if let Ok(endpoint) = std::env::var("PERMISSION_STORE_ENDPOINT") {
            config.permission_store_endpoint = Some(endpoint);
        }
        if let Ok(token) = std::env::var("PERMISSION_STORE_TOKEN") {
            config.permission_store_token = Some(token);
        }
        if let Ok(path) = std::env::var("IMAGE_STORAGE_PATH") {
            config.image_storage_path = Some(path);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_listens_on_8080() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.agent_heartbeat_window_secs, 60);
        assert_eq!(config.reservation_ttl_secs, 300);
        assert_eq!(config.cert_max_validity_days, 30);
    }
}
