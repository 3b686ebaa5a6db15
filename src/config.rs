use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::DEFAULT_BUSY_TIMEOUT;

/// Application-level constants
pub const APP_NAME: &str = "Labvault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_DB_PATH: &str = "LABVAULT_DB_PATH";
pub const ENV_BIND: &str = "LABVAULT_BIND";
pub const ENV_BUSY_TIMEOUT_MS: &str = "LABVAULT_BUSY_TIMEOUT_MS";

const DEFAULT_BIND: &str = "127.0.0.1:8640";

/// Get the application data directory (~/Labvault/)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the report database
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("labvault.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "labvault=info,labvault_lib=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address in LABVAULT_BIND: {0}")]
    InvalidBind(String),
    #[error("Invalid busy timeout in LABVAULT_BUSY_TIMEOUT_MS: {0}")]
    InvalidBusyTimeout(String),
}

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub busy_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment in production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = lookup(ENV_DB_PATH)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let bind_raw = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let busy_timeout = match lookup(ENV_BUSY_TIMEOUT_MS) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidBusyTimeout(raw))?,
            None => DEFAULT_BUSY_TIMEOUT,
        };

        Ok(Self {
            db_path,
            bind_addr,
            busy_timeout,
        })
    }
}
