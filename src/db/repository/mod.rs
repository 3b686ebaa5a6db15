//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection` so they compose inside a caller's
//! transaction (`rusqlite::Transaction` derefs to `Connection`). Operations
//! that must be atomic on their own take `&Transaction` instead.

mod audit;
mod catalog;
mod report_version;
mod test_result;
mod visit;

use uuid::Uuid;

use super::DatabaseError;

// Re-export all public items from sub-modules
pub use audit::*;
pub use catalog::*;
pub use report_version::*;
pub use test_result::*;
pub use visit::*;

/// Parse a stored TEXT id back into a `Uuid`.
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

/// Timestamp format used for every TEXT timestamp column.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
