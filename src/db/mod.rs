pub mod guard;
pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    /// A write reached a finalized or frozen row and the storage engine refused it.
    #[error("Immutability violation: {0}")]
    ImmutabilityViolation(String),
}

impl DatabaseError {
    pub fn is_immutability_violation(&self) -> bool {
        matches!(self, Self::ImmutabilityViolation(_))
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        guard::classify(err)
    }
}
