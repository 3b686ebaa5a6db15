//! Report lifecycle API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.

use std::sync::Arc;

use axum::http::header::{HeaderValue, CACHE_CONTROL};
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the report lifecycle router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let lifecycle = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/visits", post(endpoints::visits::open))
        .route("/visits/:id", get(endpoints::visits::detail))
        .route(
            "/visits/:id/report/draft",
            get(endpoints::visits::get_draft).put(endpoints::visits::save_draft),
        )
        .route(
            "/visits/:id/report/finalize",
            post(endpoints::visits::finalize),
        )
        .with_state(ctx.clone());

    // Finalized reports carry patient data and must not land in shared caches.
    let reports = Router::new()
        .route("/reports/:token", get(endpoints::reports::by_token))
        .with_state(ctx.clone())
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .nest("/api", lifecycle.merge(reports))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::Extension(ctx))
}
