use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::ReportStatus;
use crate::models::*;

const VERSION_COLUMNS: &str = "id, visit_id, version_number, status, notes, created_at, updated_at,
         finalized_at, access_token, content_hash";

pub fn insert_report_version(conn: &Connection, version: &ReportVersion) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO report_versions (id, visit_id, version_number, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            version.id.to_string(),
            version.visit_id.to_string(),
            version.version_number,
            version.status.as_str(),
            version.notes,
            version.created_at,
            version.updated_at,
        ],
    )?;
    Ok(())
}

/// The open draft for a visit, if any. At most one exists (partial unique index).
pub fn get_draft_version(conn: &Connection, visit_id: &Uuid) -> Result<Option<ReportVersion>, DatabaseError> {
    query_one_version(
        conn,
        &format!("SELECT {VERSION_COLUMNS} FROM report_versions WHERE visit_id = ?1 AND status = 'draft'"),
        &visit_id.to_string(),
    )
}

/// Highest-numbered version for a visit, whatever its status.
pub fn get_latest_version(conn: &Connection, visit_id: &Uuid) -> Result<Option<ReportVersion>, DatabaseError> {
    query_one_version(
        conn,
        &format!(
            "SELECT {VERSION_COLUMNS} FROM report_versions WHERE visit_id = ?1
             ORDER BY version_number DESC LIMIT 1"
        ),
        &visit_id.to_string(),
    )
}

/// Finalized version addressed by its access token. Drafts are never returned.
pub fn get_finalized_by_token(conn: &Connection, token: &str) -> Result<Option<ReportVersion>, DatabaseError> {
    query_one_version(
        conn,
        &format!(
            "SELECT {VERSION_COLUMNS} FROM report_versions
             WHERE access_token = ?1 AND status = 'finalized'"
        ),
        token,
    )
}

pub fn next_version_number(conn: &Connection, visit_id: &Uuid) -> Result<i64, DatabaseError> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(version_number), 0) + 1 FROM report_versions WHERE visit_id = ?1",
        params![visit_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

pub fn count_report_versions(
    conn: &Connection,
    visit_id: &Uuid,
    status: Option<ReportStatus>,
) -> Result<i64, DatabaseError> {
    let count = match status {
        Some(status) => conn.query_row(
            "SELECT COUNT(*) FROM report_versions WHERE visit_id = ?1 AND status = ?2",
            params![visit_id.to_string(), status.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM report_versions WHERE visit_id = ?1",
            params![visit_id.to_string()],
            |row| row.get(0),
        )?,
    };
    Ok(count)
}

/// Update draft metadata. Only matches while the row is still a draft.
pub fn touch_draft_version(
    conn: &Connection,
    version_id: &Uuid,
    notes: Option<&str>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE report_versions SET notes = ?2, updated_at = ?3
         WHERE id = ?1 AND status = 'draft'",
        params![version_id.to_string(), notes, super::now_timestamp()],
    )?;
    Ok(changed == 1)
}

/// Compare-and-swap a draft into the finalized state.
///
/// The `status = 'draft'` predicate is evaluated by SQLite under its write
/// lock, so among concurrent callers only one can match the row. Returns
/// `None` when no draft matched.
pub fn finalize_draft_version(
    conn: &Connection,
    version_id: &Uuid,
    finalized_at: &str,
    access_token: &str,
    content_hash: &str,
) -> Result<Option<ReportVersion>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "UPDATE report_versions
            SET status = 'finalized', finalized_at = ?2, access_token = ?3,
                content_hash = ?4, updated_at = ?2
          WHERE id = ?1 AND status = 'draft'
          RETURNING {VERSION_COLUMNS}"
    ))?;

    let result = stmt.query_row(
        params![version_id.to_string(), finalized_at, access_token, content_hash],
        |row| Ok(version_row_from_rusqlite(row)),
    );

    match result {
        Ok(row) => Ok(Some(version_from_row(row?)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_one_version(conn: &Connection, sql: &str, key: &str) -> Result<Option<ReportVersion>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let result = stmt.query_row(params![key], |row| Ok(version_row_from_rusqlite(row)));

    match result {
        Ok(row) => Ok(Some(version_from_row(row?)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Internal row type for ReportVersion mapping
struct VersionRow {
    id: String,
    visit_id: String,
    version_number: i64,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
    finalized_at: Option<String>,
    access_token: Option<String>,
    content_hash: Option<String>,
}

fn version_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<VersionRow, rusqlite::Error> {
    Ok(VersionRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        version_number: row.get(2)?,
        status: row.get(3)?,
        notes: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        finalized_at: row.get(7)?,
        access_token: row.get(8)?,
        content_hash: row.get(9)?,
    })
}

fn version_from_row(row: VersionRow) -> Result<ReportVersion, DatabaseError> {
    Ok(ReportVersion {
        id: super::parse_uuid(&row.id)?,
        visit_id: super::parse_uuid(&row.visit_id)?,
        version_number: row.version_number,
        status: ReportStatus::from_str(&row.status)?,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
        finalized_at: row.finalized_at,
        access_token: row.access_token,
        content_hash: row.content_hash,
    })
}
