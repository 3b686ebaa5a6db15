use uuid::Uuid;

use crate::db::DatabaseError;

/// Errors from the report lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Malformed or out-of-scope submission. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Visit not found: {0}")]
    VisitNotFound(Uuid),
    /// No open draft: never created, already finalized, or finalized
    /// concurrently by another caller.
    #[error("No draft report for visit {0}")]
    NoDraftFound(Uuid),
    #[error("Report not found")]
    ReportNotFound,
    /// Storage refused a write to a finalized or frozen record.
    #[error("Immutability violation: {0}")]
    ImmutabilityViolation(String),
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl ReportError {
    /// Retrying finalize callers treat this outcome as success-equivalent.
    pub fn is_already_done(&self) -> bool {
        matches!(self, Self::NoDraftFound(_))
    }

    pub fn is_immutability_violation(&self) -> bool {
        matches!(self, Self::ImmutabilityViolation(_))
    }
}

impl From<DatabaseError> for ReportError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ImmutabilityViolation(detail) => ReportError::ImmutabilityViolation(detail),
            other => ReportError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ReportError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}
