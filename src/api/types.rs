//! Shared types for the API layer.

use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run one unit of work on a fresh connection, off the async runtime.
    ///
    /// SQLite calls block (including waits on the write lock), so they run
    /// on the blocking pool. Guard rejections are counted here.
    pub async fn with_db<T, E, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ApiError> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        let result = tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
            let mut conn = core.open_db()?;
            work(&mut conn).map_err(Into::into)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?;

        if let Err(err) = &result {
            if err.is_record_locked() {
                self.core.record_immutability_alert();
            }
        }
        result
    }
}

/// Parse a visit id path segment.
pub fn parse_visit_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid visit id: {raw}")))
}
