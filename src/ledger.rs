//! Visit ledger: intake boundary and the price snapshot.
//!
//! Ordering a test copies the catalog row (price, name, unit, reference
//! range) onto the visit's own `test_orders` row. Billing and reporting read
//! only those copies, so later catalog edits never reach a placed order.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::{ReportStatus, VisitStatus};
use crate::models::{TestOrder, Visit};

/// Maximum number of tests that can be ordered onto one visit.
pub const MAX_TESTS_PER_VISIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid visit intake: {0}")]
    Validation(String),
    #[error("Visit not found: {0}")]
    VisitNotFound(Uuid),
    #[error("Visit {0} is completed")]
    VisitCompleted(Uuid),
    #[error("Immutability violation: {0}")]
    ImmutabilityViolation(String),
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for LedgerError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ImmutabilityViolation(detail) => LedgerError::ImmutabilityViolation(detail),
            other => LedgerError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

/// Intake payload supplied by the (external) registration flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitIntake {
    pub branch_ref: String,
    pub patient_ref: String,
    pub tests: Vec<String>,
}

/// Visit with its frozen orders and billing total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitSummary {
    pub visit: Visit,
    pub orders: Vec<TestOrder>,
    pub billing_total: i64,
    pub report_status: Option<ReportStatus>,
    pub report_version: Option<i64>,
}

/// Create a visit in `draft` and order every requested test at today's price.
pub fn open_visit(conn: &mut Connection, intake: &VisitIntake) -> Result<VisitSummary, LedgerError> {
    if intake.branch_ref.trim().is_empty() {
        return Err(LedgerError::Validation("branch_ref is required".into()));
    }
    if intake.patient_ref.trim().is_empty() {
        return Err(LedgerError::Validation("patient_ref is required".into()));
    }
    if intake.tests.is_empty() {
        return Err(LedgerError::Validation("at least one test must be ordered".into()));
    }
    if intake.tests.len() > MAX_TESTS_PER_VISIT {
        return Err(LedgerError::Validation(format!(
            "at most {MAX_TESTS_PER_VISIT} tests per visit"
        )));
    }
    let mut seen = HashSet::new();
    for code in &intake.tests {
        if !seen.insert(code.as_str()) {
            return Err(LedgerError::Validation(format!("test {code} ordered twice")));
        }
    }

    let tx = conn.transaction()?;
    let now = db::now_timestamp();
    let visit = Visit {
        id: Uuid::new_v4(),
        branch_ref: intake.branch_ref.trim().to_string(),
        patient_ref: intake.patient_ref.trim().to_string(),
        status: VisitStatus::Draft,
        created_at: now.clone(),
        updated_at: now,
    };
    db::insert_visit(&tx, &visit)?;

    for (position, code) in intake.tests.iter().enumerate() {
        let order = snapshot_order(&tx, &visit.id, code, position as i64)?;
        db::insert_test_order(&tx, &order)?;
    }
    tx.commit()?;

    tracing::info!(visit_id = %visit.id, tests = intake.tests.len(), "Visit opened");
    get_visit_summary(conn, &visit.id)
}

/// Add one more test to a visit that has not completed.
pub fn order_test(conn: &mut Connection, visit_id: &Uuid, code: &str) -> Result<TestOrder, LedgerError> {
    let tx = conn.transaction()?;
    let visit = db::get_visit(&tx, visit_id)?.ok_or(LedgerError::VisitNotFound(*visit_id))?;
    if visit.status.is_terminal() {
        return Err(LedgerError::VisitCompleted(*visit_id));
    }

    let existing = db::get_test_orders(&tx, visit_id)?;
    if existing.iter().any(|o| o.test_code == code) {
        return Err(LedgerError::Validation(format!("test {code} already ordered")));
    }
    if existing.len() >= MAX_TESTS_PER_VISIT {
        return Err(LedgerError::Validation(format!(
            "at most {MAX_TESTS_PER_VISIT} tests per visit"
        )));
    }

    let position = db::next_order_position(&tx, visit_id)?;
    let order = snapshot_order(&tx, visit_id, code, position)?;
    db::insert_test_order(&tx, &order)?;
    tx.commit()?;

    tracing::info!(visit_id = %visit_id, test_code = code, unit_price = order.unit_price, "Test ordered");
    Ok(order)
}

/// Sum of frozen order prices. Never consults the live catalog.
pub fn billing_total(conn: &Connection, visit_id: &Uuid) -> Result<i64, LedgerError> {
    if db::get_visit(conn, visit_id)?.is_none() {
        return Err(LedgerError::VisitNotFound(*visit_id));
    }
    Ok(db::visit_billing_total(conn, visit_id)?)
}

pub fn get_visit_summary(conn: &Connection, visit_id: &Uuid) -> Result<VisitSummary, LedgerError> {
    let visit = db::get_visit(conn, visit_id)?.ok_or(LedgerError::VisitNotFound(*visit_id))?;
    let orders = db::get_test_orders(conn, visit_id)?;
    let billing_total = db::visit_billing_total(conn, visit_id)?;
    let latest = db::get_latest_version(conn, visit_id)?;

    Ok(VisitSummary {
        visit,
        orders,
        billing_total,
        report_status: latest.as_ref().map(|v| v.status),
        report_version: latest.map(|v| v.version_number),
    })
}

fn snapshot_order(
    conn: &Connection,
    visit_id: &Uuid,
    code: &str,
    position: i64,
) -> Result<TestOrder, LedgerError> {
    let catalog = db::get_catalog_test(conn, code)?
        .ok_or_else(|| LedgerError::Validation(format!("unknown test code: {code}")))?;

    Ok(TestOrder {
        id: Uuid::new_v4(),
        visit_id: *visit_id,
        test_code: catalog.code,
        test_name: catalog.name,
        unit: catalog.unit,
        unit_price: catalog.unit_price,
        ref_min: catalog.ref_min,
        ref_max: catalog.ref_max,
        position,
        ordered_at: db::now_timestamp(),
    })
}
