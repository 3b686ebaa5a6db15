//! Draft editor.
//!
//! `save_draft` validates a submission against the visit's frozen orders,
//! derives flags, and replaces the open draft's result set wholesale. The
//! first save creates version 1; later saves rewrite that same row.

use std::collections::HashSet;

use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ReportError;
use super::flag::flag_for_order;
use crate::db;
use crate::models::enums::{ReportStatus, ResultFlag, VisitStatus};
use crate::models::{ReportVersion, TestOrder, TestResult};

/// Longest accepted free-text note, in characters.
pub const MAX_NOTE_LEN: usize = 1000;

/// One submitted measurement. `test_id` is the ordered test's code or its
/// order id. A client-supplied `flag` is advisory; the stored flag is always
/// derived from the value and the frozen reference range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub test_id: String,
    pub value: Option<f64>,
    #[serde(default)]
    pub flag: Option<ResultFlag>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftSubmission {
    pub results: Vec<ResultSubmission>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A submission that has passed validation against a visit's orders.
#[derive(Debug, Clone)]
pub struct ValidatedDraft {
    entries: Vec<ValidatedEntry>,
    notes: Option<String>,
}

#[derive(Debug, Clone)]
struct ValidatedEntry {
    order_id: Uuid,
    value: Option<f64>,
    flag: Option<ResultFlag>,
    notes: Option<String>,
}

impl ValidatedDraft {
    fn into_results(self, version_id: Uuid) -> (Vec<TestResult>, Option<String>) {
        let results = self
            .entries
            .into_iter()
            .map(|e| TestResult {
                id: Uuid::new_v4(),
                version_id,
                order_id: e.order_id,
                value: e.value,
                flag: e.flag,
                notes: e.notes,
            })
            .collect();
        (results, self.notes)
    }
}

impl DraftSubmission {
    /// Check every entry against the visit's orders. No state is touched.
    pub fn validate(&self, orders: &[TestOrder]) -> Result<ValidatedDraft, ReportError> {
        if self.results.is_empty() {
            return Err(ReportError::Validation("at least one result is required".into()));
        }
        check_note(self.notes.as_deref(), "report notes")?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(self.results.len());
        for submission in &self.results {
            let test_id = submission.test_id.trim();
            let order = orders
                .iter()
                .find(|o| o.test_code == test_id || o.id.to_string() == test_id)
                .ok_or_else(|| {
                    ReportError::Validation(format!("test {test_id} is not ordered on this visit"))
                })?;

            if !seen.insert(order.id) {
                return Err(ReportError::Validation(format!(
                    "test {} submitted more than once",
                    order.test_code
                )));
            }
            if let Some(value) = submission.value {
                if !value.is_finite() {
                    return Err(ReportError::Validation(format!(
                        "value for {} must be a finite number",
                        order.test_code
                    )));
                }
            }
            check_note(submission.notes.as_deref(), &order.test_code)?;

            let flag = flag_for_order(order, submission.value);
            if submission.flag.is_some() && submission.flag != flag {
                tracing::debug!(
                    test_code = %order.test_code,
                    submitted = ?submission.flag,
                    derived = ?flag,
                    "Ignoring client-supplied flag"
                );
            }

            entries.push(ValidatedEntry {
                order_id: order.id,
                value: submission.value,
                flag,
                notes: normalize_note(submission.notes.as_deref()),
            });
        }

        Ok(ValidatedDraft {
            entries,
            notes: normalize_note(self.notes.as_deref()),
        })
    }
}

fn check_note(note: Option<&str>, field: &str) -> Result<(), ReportError> {
    if let Some(note) = note {
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(ReportError::Validation(format!(
                "notes for {field} must be {MAX_NOTE_LEN} characters or fewer"
            )));
        }
    }
    Ok(())
}

fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim).filter(|n| !n.is_empty()).map(String::from)
}

/// Result of a successful save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftOutcome {
    pub version: ReportVersion,
    pub created: bool,
    pub results: Vec<TestResult>,
}

/// Save (create or replace) the draft report for a visit.
///
/// Runs in one immediate transaction. Fails with `NoDraftFound` when the
/// visit is completed or its latest version is already finalized.
pub fn save_draft(
    conn: &mut Connection,
    visit_id: &Uuid,
    submission: &DraftSubmission,
) -> Result<DraftOutcome, ReportError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let visit = db::get_visit(&tx, visit_id)?.ok_or(ReportError::VisitNotFound(*visit_id))?;
    if visit.status.is_terminal() {
        return Err(ReportError::NoDraftFound(*visit_id));
    }

    let orders = db::get_test_orders(&tx, visit_id)?;
    let validated = submission.validate(&orders)?;

    let (version, created) = match db::get_draft_version(&tx, visit_id)? {
        Some(draft) => (draft, false),
        None => {
            if let Some(latest) = db::get_latest_version(&tx, visit_id)? {
                if latest.status == ReportStatus::Finalized {
                    return Err(ReportError::NoDraftFound(*visit_id));
                }
            }
            let now = db::now_timestamp();
            let draft = ReportVersion {
                id: Uuid::new_v4(),
                visit_id: *visit_id,
                version_number: db::next_version_number(&tx, visit_id)?,
                status: ReportStatus::Draft,
                notes: None,
                created_at: now.clone(),
                updated_at: now,
                finalized_at: None,
                access_token: None,
                content_hash: None,
            };
            db::insert_report_version(&tx, &draft)?;
            (draft, true)
        }
    };

    let (results, notes) = validated.into_results(version.id);
    db::replace_results(&tx, &version.id, &results)?;
    if !db::touch_draft_version(&tx, &version.id, notes.as_deref())? {
        return Err(ReportError::NoDraftFound(*visit_id));
    }

    if visit.status == VisitStatus::Draft {
        db::advance_visit_status(&tx, visit_id, VisitStatus::Draft, VisitStatus::AwaitingResults)?;
    }

    db::insert_audit_event(
        &tx,
        "report.draft_saved",
        &format!("visit:{visit_id}"),
        Some(&format!("version={} results={}", version.version_number, results.len())),
    )?;

    let version = db::get_draft_version(&tx, visit_id)?.ok_or(ReportError::NoDraftFound(*visit_id))?;
    tx.commit()?;

    tracing::info!(
        visit_id = %visit_id,
        version = version.version_number,
        created,
        results = results.len(),
        "Draft report saved"
    );

    Ok(DraftOutcome {
        version,
        created,
        results,
    })
}

/// Current draft and its results, for staff editing screens.
pub fn load_draft(conn: &Connection, visit_id: &Uuid) -> Result<DraftOutcome, ReportError> {
    if db::get_visit(conn, visit_id)?.is_none() {
        return Err(ReportError::VisitNotFound(*visit_id));
    }
    let version = db::get_draft_version(conn, visit_id)?.ok_or(ReportError::NoDraftFound(*visit_id))?;
    let results = db::get_results(conn, &version.id)?;
    Ok(DraftOutcome {
        version,
        created: false,
        results,
    })
}
