//! Read access to finalized reports by opaque token.
//!
//! Reads here never write: no audit rows, no timestamps. The rendered
//! report is a pure function of immutable rows, so repeated reads
//! serialize to the same bytes.

use base64::Engine;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::ReportError;
use crate::db;
use crate::models::enums::ResultFlag;
use crate::models::{TestOrder, TestResult};

/// Upper bound on accepted token length; longer inputs are not looked up.
const MAX_TOKEN_LEN: usize = 128;

/// One line of a rendered report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub test_code: String,
    pub test_name: String,
    pub unit: Option<String>,
    pub ref_min: f64,
    pub ref_max: f64,
    pub value: Option<f64>,
    pub flag: Option<ResultFlag>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedReport {
    pub visit_id: Uuid,
    pub branch_ref: String,
    pub patient_ref: String,
    pub version_number: i64,
    pub finalized_at: String,
    pub notes: Option<String>,
    pub lines: Vec<ReportLine>,
    pub content_hash: String,
}

/// Mint an access token: 32 bytes of entropy, URL-safe base64.
pub fn generate_access_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Join results to their frozen orders, in order position.
pub(crate) fn build_lines(orders: &[TestOrder], results: &[TestResult]) -> Vec<ReportLine> {
    orders
        .iter()
        .filter_map(|order| {
            results.iter().find(|r| r.order_id == order.id).map(|r| ReportLine {
                test_code: order.test_code.clone(),
                test_name: order.test_name.clone(),
                unit: order.unit.clone(),
                ref_min: order.ref_min,
                ref_max: order.ref_max,
                value: r.value,
                flag: r.flag,
                notes: r.notes.clone(),
            })
        })
        .collect()
}

/// SHA-256 over the canonical JSON of the report content, hex encoded.
pub(crate) fn content_hash(
    visit_id: &Uuid,
    version_number: i64,
    notes: Option<&str>,
    lines: &[ReportLine],
) -> String {
    let canonical = serde_json::json!({
        "visit_id": visit_id,
        "version": version_number,
        "notes": notes,
        "lines": lines,
    });
    let digest = Sha256::digest(canonical.to_string().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fetch a finalized report by its access token.
pub fn read_by_token(conn: &Connection, token: &str) -> Result<FinalizedReport, ReportError> {
    let token = token.trim();
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(ReportError::ReportNotFound);
    }

    let version = db::get_finalized_by_token(conn, token)?.ok_or(ReportError::ReportNotFound)?;
    let visit = db::get_visit(conn, &version.visit_id)?.ok_or(ReportError::ReportNotFound)?;
    let orders = db::get_test_orders(conn, &version.visit_id)?;
    let results = db::get_results(conn, &version.id)?;

    let (finalized_at, content_hash) = match (version.finalized_at, version.content_hash) {
        (Some(at), Some(hash)) => (at, hash),
        _ => {
            return Err(ReportError::Database(db::DatabaseError::ConstraintViolation(format!(
                "finalized version {} is missing its stamp",
                version.id
            ))))
        }
    };

    Ok(FinalizedReport {
        visit_id: visit.id,
        branch_ref: visit.branch_ref,
        patient_ref: visit.patient_ref,
        version_number: version.version_number,
        finalized_at,
        notes: version.notes,
        lines: build_lines(&orders, &results),
        content_hash,
    })
}

/// Recompute the content hash and compare with the one stamped at finalization.
pub fn verify_integrity(report: &FinalizedReport) -> bool {
    content_hash(
        &report.visit_id,
        report.version_number,
        report.notes.as_deref(),
        &report.lines,
    ) == report.content_hash
}
