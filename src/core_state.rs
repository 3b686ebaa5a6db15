//! Shared application state.
//!
//! `CoreState` holds what every request needs to reach storage. There is no
//! in-memory copy of report state: each unit of work opens its own
//! connection and relies on SQLite for atomicity.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::AppConfig;
use crate::db;

pub struct CoreState {
    /// Report database file.
    pub db_path: PathBuf,
    /// How long a writer waits on the SQLite write lock.
    pub busy_timeout: Duration,
    /// Writes refused by the immutability guard since startup.
    immutability_alerts: AtomicU64,
}

impl CoreState {
    /// Create state for the configured database, applying migrations once up front.
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        Self::open(&config.db_path, config.busy_timeout)
    }

    pub fn open(db_path: &Path, busy_timeout: Duration) -> Result<Self, CoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CoreError::Io(e.to_string()))?;
            }
        }
        db::open_database(db_path, busy_timeout)?;
        tracing::info!(path = %db_path.display(), "Report database ready");

        Ok(Self {
            db_path: db_path.to_path_buf(),
            busy_timeout,
            immutability_alerts: AtomicU64::new(0),
        })
    }

    /// Open a fresh connection for one unit of work.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path, self.busy_timeout).map_err(CoreError::Database)
    }

    /// Count a write refused by the immutability guard.
    pub fn record_immutability_alert(&self) -> u64 {
        let total = self.immutability_alerts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(total, "Immutability alert counted");
        total
    }

    pub fn immutability_alerts(&self) -> u64 {
        self.immutability_alerts.load(Ordering::Relaxed)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(String),
}
