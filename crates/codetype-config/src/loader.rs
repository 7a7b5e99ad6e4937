use std::path::{Path, PathBuf};

use codetype_common::{Error, Result};
use tracing::info;

use crate::model::AppConfig;

const ENV_HTTP_PORT: &str = "HTTP_PORT";
const ENV_DATABASE_DSN: &str = "DATABASE_DSN";
const ENV_ADMIN_URL: &str = "KRATOS_ADMIN_URL";
const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Loads configuration from an optional file, then environment variables.
///
/// Environment variables win over file values. Required settings are checked
/// last, so either source may supply them.
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Look for `config.yml` / `config.toml` in the working directory.
    pub fn new() -> Self {
        Self::with_dir(".")
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            config_file: None,
        }
    }

    /// Use an explicit config file; its extension selects the format.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            config_dir,
            config_file: Some(path),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load(&self) -> Result<AppConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable environment lookup.
    pub fn load_with_env<F>(&self, env: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.load_file()?;
        apply_env_overrides(&mut config, env)?;
        validate(&config)?;
        Ok(config)
    }

    fn load_file(&self) -> Result<AppConfig> {
        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return parse_file(path);
        }

        let yaml_path = self.config_dir.join("config.yml");
        let toml_path = self.config_dir.join("config.toml");

        if yaml_path.exists() {
            parse_file(&yaml_path)
        } else if toml_path.exists() {
            parse_file(&toml_path)
        } else {
            info!("no config file found, using defaults and environment");
            Ok(AppConfig::default())
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_file(path: &Path) -> Result<AppConfig> {
    info!("loading config from {}", path.display());
    let contents = std::fs::read_to_string(path)?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}"))),
        _ => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}"))),
    }
}

fn apply_env_overrides<F>(config: &mut AppConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

    if let Some(port) = non_empty(ENV_HTTP_PORT) {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{ENV_HTTP_PORT} is not a valid port: {port}")))?;
    }
    if let Some(dsn) = non_empty(ENV_DATABASE_DSN) {
        config.database.path = dsn;
    }
    if let Some(url) = non_empty(ENV_ADMIN_URL) {
        config.identity.admin_url = url;
    }
    if let Some(level) = non_empty(ENV_LOG_LEVEL) {
        config.log_level = Some(level);
    }

    Ok(())
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.database.path.trim().is_empty() {
        return Err(Error::Config(format!(
            "{ENV_DATABASE_DSN} is required (or database.path in the config file)"
        )));
    }

    if config.identity.admin_url.trim().is_empty() {
        return Err(Error::Config(format!(
            "{ENV_ADMIN_URL} is required (or identity.admin_url in the config file)"
        )));
    }
    url::Url::parse(&config.identity.admin_url).map_err(|e| {
        Error::Config(format!(
            "identity admin url {} is invalid: {e}",
            config.identity.admin_url
        ))
    })?;

    if config.identity.request_timeout_secs == 0 {
        return Err(Error::Config(
            "identity.request_timeout_secs must be positive".into(),
        ));
    }

    let db = &config.database;
    if db.max_open_connections == 0 {
        return Err(Error::Config(
            "database.max_open_connections must be positive".into(),
        ));
    }
    if db.max_idle_connections > db.max_open_connections {
        return Err(Error::Config(format!(
            "database.max_idle_connections ({}) exceeds max_open_connections ({})",
            db.max_idle_connections, db.max_open_connections
        )));
    }

    Ok(())
}
