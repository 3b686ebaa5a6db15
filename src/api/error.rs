//! API error types with structured JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::ledger::LedgerError;
use crate::report::ReportError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No draft: {0}")]
    NoDraft(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Storage refused a write to a finalized record. Operational alert.
    #[error("Record locked: {0}")]
    RecordLocked(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn is_record_locked(&self) -> bool {
        matches!(self, Self::RecordLocked(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Validation(detail) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", detail.clone())
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::NoDraft(detail) => (StatusCode::NOT_FOUND, "NO_DRAFT", detail.clone()),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            // Already logged on the alert target when the guard fired.
            ApiError::RecordLocked(_) => (
                StatusCode::CONFLICT,
                "RECORD_LOCKED",
                "This record is finalized and cannot be changed".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Validation(detail) => ApiError::Validation(detail),
            ReportError::VisitNotFound(id) => ApiError::NotFound(format!("Visit {id} not found")),
            ReportError::NoDraftFound(id) => {
                ApiError::NoDraft(format!("Visit {id} has no open draft report"))
            }
            ReportError::ReportNotFound => ApiError::NotFound("Report not found".into()),
            ReportError::ImmutabilityViolation(detail) => ApiError::RecordLocked(detail),
            ReportError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(detail) => ApiError::Validation(detail),
            LedgerError::VisitNotFound(id) => ApiError::NotFound(format!("Visit {id} not found")),
            LedgerError::VisitCompleted(id) => ApiError::Conflict(format!("Visit {id} is completed")),
            LedgerError::ImmutabilityViolation(detail) => ApiError::RecordLocked(detail),
            LedgerError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        match err {
            crate::db::DatabaseError::ImmutabilityViolation(detail) => ApiError::RecordLocked(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Malformed or mistyped request bodies answer in the same JSON error shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => e.into(),
            CoreError::Io(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;

    use crate::core_state::CoreState;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn validation_returns_400() {
        let response = ApiError::Validation("test XRAY is not ordered".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["message"], "test XRAY is not ordered");
    }

    #[tokio::test]
    async fn no_draft_returns_404_with_distinct_code() {
        let api: ApiError = ReportError::NoDraftFound(Uuid::nil()).into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NO_DRAFT");
    }

    #[tokio::test]
    async fn immutability_maps_to_record_locked_without_detail() {
        let api: ApiError = ReportError::ImmutabilityViolation("report version is finalized".into()).into();
        assert!(api.is_record_locked());
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "RECORD_LOCKED");
        assert_eq!(json["error"]["message"], "This record is finalized and cannot be changed");
    }

    #[tokio::test]
    async fn ledger_immutability_maps_to_record_locked() {
        let api: ApiError = LedgerError::ImmutabilityViolation("visit is completed".into()).into();
        assert!(api.is_record_locked());
    }

    #[tokio::test]
    async fn internal_returns_500() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        // Internal errors hide details from client
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[derive(Clone, Default)]
    struct AlertCounter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for AlertCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
            let meta = event.metadata();
            if meta.target() == crate::db::guard::ALERT_TARGET && *meta.level() == tracing::Level::ERROR {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn guard_rejection_is_logged_once_on_its_way_to_the_client() {
        use tracing_subscriber::layer::SubscriberExt;

        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::open(&dir.path().join("labvault.db"), std::time::Duration::from_secs(5)).unwrap();
        let counter = AlertCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());

        let status = tracing::subscriber::with_default(subscriber, || {
            let raw = rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER),
                Some("IMMUTABLE: report version is finalized".into()),
            );
            let api: ApiError = ReportError::from(crate::db::DatabaseError::from(raw)).into();
            assert!(api.is_record_locked());
            core.record_immutability_alert();
            api.into_response().status()
        });

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(core.immutability_alerts(), 1);
    }

    #[tokio::test]
    async fn report_not_found_returns_404() {
        let api: ApiError = ReportError::ReportNotFound.into();
        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }
}
