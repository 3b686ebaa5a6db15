//! Finalizer: the one-way DRAFT → FINALIZED transition.
//!
//! Exactly-once rests on a compare-and-swap: the finalizing UPDATE only
//! matches while `status = 'draft'`, and SQLite evaluates that predicate
//! under its single write lock. A caller that loses the race matches zero
//! rows and gets `NoDraftFound`. The immediate transaction just makes the
//! loser wait on the lock instead of failing with SQLITE_BUSY.

use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::access::{build_lines, content_hash, generate_access_token};
use super::error::ReportError;
use crate::db::{self, DatabaseError};
use crate::models::enums::VisitStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub visit_id: Uuid,
    pub version_id: Uuid,
    pub version_number: i64,
    pub access_token: String,
    pub finalized_at: String,
    pub content_hash: String,
}

/// Finalize the open draft of a visit.
///
/// Not idempotent: a second call returns `NoDraftFound`, which retrying
/// callers should read as "already done" (`ReportError::is_already_done`).
pub fn finalize(conn: &mut Connection, visit_id: &Uuid) -> Result<FinalizeOutcome, ReportError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if db::get_visit(&tx, visit_id)?.is_none() {
        return Err(ReportError::VisitNotFound(*visit_id));
    }
    let draft = db::get_draft_version(&tx, visit_id)?.ok_or(ReportError::NoDraftFound(*visit_id))?;

    let orders = db::get_test_orders(&tx, visit_id)?;
    let results = db::get_results(&tx, &draft.id)?;
    let lines = build_lines(&orders, &results);
    let hash = content_hash(visit_id, draft.version_number, draft.notes.as_deref(), &lines);

    let token = generate_access_token();
    let finalized_at = db::now_timestamp();

    let version = db::finalize_draft_version(&tx, &draft.id, &finalized_at, &token, &hash)?
        .ok_or(ReportError::NoDraftFound(*visit_id))?;

    if !db::advance_visit_status(&tx, visit_id, VisitStatus::AwaitingResults, VisitStatus::Completed)? {
        return Err(ReportError::Database(DatabaseError::ConstraintViolation(format!(
            "visit {visit_id} was not awaiting results"
        ))));
    }

    db::insert_audit_event(
        &tx,
        "report.finalized",
        &format!("visit:{visit_id}"),
        Some(&format!("version={} hash={hash}", version.version_number)),
    )?;
    tx.commit()?;

    tracing::info!(
        visit_id = %visit_id,
        version = version.version_number,
        lines = lines.len(),
        "Report finalized"
    );

    Ok(FinalizeOutcome {
        visit_id: *visit_id,
        version_id: version.id,
        version_number: version.version_number,
        access_token: token,
        finalized_at,
        content_hash: hash,
    })
}
