//! Finalized report access.
//!
//! `GET /api/reports/:token`: the only way to read a finalized report.
//! Read-only: nothing is written on this path.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::report::{self, FinalizedReport};

/// `GET /api/reports/:token`
pub async fn by_token(
    State(ctx): State<ApiContext>,
    Path(token): Path<String>,
) -> Result<Json<FinalizedReport>, ApiError> {
    let report = ctx
        .with_db(move |conn| report::read_by_token(conn, &token))
        .await?;
    Ok(Json(report))
}
