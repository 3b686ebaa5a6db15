use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// One row of the lifecycle audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub timestamp: String,
    pub action: String,
    pub entity: String,
    pub detail: Option<String>,
}

/// Append a lifecycle event. Callers write it inside the same transaction
/// as the change it describes.
pub fn insert_audit_event(
    conn: &Connection,
    action: &str,
    entity: &str,
    detail: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, action, entity, detail) VALUES (?1, ?2, ?3, ?4)",
        params![super::now_timestamp(), action, entity, detail],
    )?;
    Ok(())
}

/// All events recorded against an entity, oldest first.
pub fn get_audit_events(conn: &Connection, entity: &str) -> Result<Vec<AuditEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, entity, detail FROM audit_log
         WHERE entity = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![entity], |row| {
            Ok(AuditEvent {
                timestamp: row.get(0)?,
                action: row.get(1)?,
                entity: row.get(2)?,
                detail: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Count events with the given action across all entities.
pub fn count_audit_events(conn: &Connection, action: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM audit_log WHERE action = ?1",
        params![action],
        |row| row.get(0),
    )?;
    Ok(count)
}
