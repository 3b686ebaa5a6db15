use std::str::FromStr;

use rusqlite::{params, Connection, Transaction};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::ResultFlag;
use crate::models::*;

/// Replace the full result set of a version.
///
/// Takes a `Transaction` so the delete and the re-inserts commit or roll
/// back together; a draft is never left half-written. Against a finalized
/// version the storage guard aborts the delete.
pub fn replace_results(
    tx: &Transaction<'_>,
    version_id: &Uuid,
    results: &[TestResult],
) -> Result<(), DatabaseError> {
    tx.execute(
        "DELETE FROM test_results WHERE version_id = ?1",
        params![version_id.to_string()],
    )?;

    let mut stmt = tx.prepare(
        "INSERT INTO test_results (id, version_id, order_id, value, flag, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for result in results {
        if result.version_id != *version_id {
            return Err(DatabaseError::ConstraintViolation(format!(
                "result {} belongs to version {}, not {version_id}",
                result.id, result.version_id
            )));
        }
        stmt.execute(params![
            result.id.to_string(),
            result.version_id.to_string(),
            result.order_id.to_string(),
            result.value,
            result.flag.map(|f| f.as_str()),
            result.notes,
        ])?;
    }
    Ok(())
}

/// Results of a version in test-order position.
pub fn get_results(conn: &Connection, version_id: &Uuid) -> Result<Vec<TestResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT tr.id, tr.version_id, tr.order_id, tr.value, tr.flag, tr.notes
         FROM test_results tr
         JOIN test_orders o ON o.id = tr.order_id
         WHERE tr.version_id = ?1
         ORDER BY o.position ASC",
    )?;

    let rows = stmt.query_map(params![version_id.to_string()], |row| Ok(result_row_from_rusqlite(row)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(result_from_row(row??)?);
    }
    Ok(results)
}

// Internal row type for TestResult mapping
struct ResultRow {
    id: String,
    version_id: String,
    order_id: String,
    value: Option<f64>,
    flag: Option<String>,
    notes: Option<String>,
}

fn result_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ResultRow, rusqlite::Error> {
    Ok(ResultRow {
        id: row.get(0)?,
        version_id: row.get(1)?,
        order_id: row.get(2)?,
        value: row.get(3)?,
        flag: row.get(4)?,
        notes: row.get(5)?,
    })
}

fn result_from_row(row: ResultRow) -> Result<TestResult, DatabaseError> {
    Ok(TestResult {
        id: super::parse_uuid(&row.id)?,
        version_id: super::parse_uuid(&row.version_id)?,
        order_id: super::parse_uuid(&row.order_id)?,
        value: row.value,
        flag: row.flag.as_deref().map(ResultFlag::from_str).transpose()?,
        notes: row.notes,
    })
}
