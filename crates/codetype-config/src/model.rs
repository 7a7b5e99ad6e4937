use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Header the upstream gateway sets after it has validated the session.
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user_id_header: default_user_id_header(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_user_id_header() -> String {
    "X-User-Id".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file.
    #[serde(default)]
    pub path: String,

    #[serde(default = "default_max_open")]
    pub max_open_connections: u32,

    #[serde(default = "default_max_idle")]
    pub max_idle_connections: u32,

    #[serde(default = "default_max_lifetime_secs")]
    pub connection_max_lifetime_secs: u64,
}

impl DatabaseConfig {
    pub fn connection_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.connection_max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_open_connections: default_max_open(),
            max_idle_connections: default_max_idle(),
            connection_max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

fn default_max_open() -> u32 {
    10
}

fn default_max_idle() -> u32 {
    5
}

fn default_max_lifetime_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider's admin API, e.g. `http://kratos:4434`.
    #[serde(default)]
    pub admin_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl IdentityConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            admin_url: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}
