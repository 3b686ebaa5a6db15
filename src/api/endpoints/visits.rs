//! Visit and report lifecycle endpoints.
//!
//! - `POST /api/visits`: intake (frozen prices)
//! - `GET  /api/visits/:id`: orders, billing total, report status
//! - `GET  /api/visits/:id/report/draft`: current draft
//! - `PUT  /api/visits/:id/report/draft`: replace draft content
//! - `POST /api/visits/:id/report/finalize`: one-way finalization

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_visit_id, ApiContext};
use crate::ledger::{self, VisitIntake, VisitSummary};
use crate::models::TestResult;
use crate::report::{self, DraftSubmission};

#[derive(Serialize)]
pub struct DraftResponse {
    pub visit_id: String,
    pub version_number: i64,
    pub status: &'static str,
    pub created: bool,
    pub notes: Option<String>,
    pub updated_at: String,
    pub results: Vec<TestResult>,
}

impl From<report::DraftOutcome> for DraftResponse {
    fn from(outcome: report::DraftOutcome) -> Self {
        Self {
            visit_id: outcome.version.visit_id.to_string(),
            version_number: outcome.version.version_number,
            status: outcome.version.status.as_str(),
            created: outcome.created,
            notes: outcome.version.notes,
            updated_at: outcome.version.updated_at,
            results: outcome.results,
        }
    }
}

#[derive(Serialize)]
pub struct FinalizeResponse {
    pub visit_id: String,
    pub version_number: i64,
    pub access_token: String,
    pub finalized_at: String,
    pub content_hash: String,
}

/// `POST /api/visits`
pub async fn open(
    State(ctx): State<ApiContext>,
    body: Result<Json<VisitIntake>, JsonRejection>,
) -> Result<(StatusCode, Json<VisitSummary>), ApiError> {
    let Json(intake) = body?;
    let summary = ctx.with_db(move |conn| ledger::open_visit(conn, &intake)).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// `GET /api/visits/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<VisitSummary>, ApiError> {
    let visit_id = parse_visit_id(&id)?;
    let summary = ctx
        .with_db(move |conn| ledger::get_visit_summary(conn, &visit_id))
        .await?;
    Ok(Json(summary))
}

/// `GET /api/visits/:id/report/draft`
pub async fn get_draft(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DraftResponse>, ApiError> {
    let visit_id = parse_visit_id(&id)?;
    let outcome = ctx
        .with_db(move |conn| report::load_draft(conn, &visit_id))
        .await?;
    Ok(Json(outcome.into()))
}

/// `PUT /api/visits/:id/report/draft`
pub async fn save_draft(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    body: Result<Json<DraftSubmission>, JsonRejection>,
) -> Result<Json<DraftResponse>, ApiError> {
    let Json(submission) = body?;
    let visit_id = parse_visit_id(&id)?;
    let outcome = ctx
        .with_db(move |conn| report::save_draft(conn, &visit_id, &submission))
        .await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/visits/:id/report/finalize`
///
/// The access token is returned exactly once, here. Notification dispatch
/// is the caller's responsibility.
pub async fn finalize(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let visit_id = parse_visit_id(&id)?;
    let outcome = ctx
        .with_db(move |conn| report::finalize(conn, &visit_id))
        .await?;

    Ok(Json(FinalizeResponse {
        visit_id: outcome.visit_id.to_string(),
        version_number: outcome.version_number,
        access_token: outcome.access_token,
        finalized_at: outcome.finalized_at,
        content_hash: outcome.content_hash,
    }))
}
