//! Route configuration for the two listeners.

use axum::routing::any;
use axum::Router;
use ferroas2_infra::request_id_middleware;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::file_receive::receive_file;
use crate::handlers::mdn_receive::receive_mdn;
use crate::state::AppState;

pub const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// File receiver: `/` and `/as2`.
pub fn file_routes(state: AppState) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route("/", any(receive_file))
        .route("/as2", any(receive_file))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}

/// Async MDN receiver: `/` and `/mdn`.
pub fn mdn_routes(state: AppState) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route("/", any(receive_mdn))
        .route("/mdn", any(receive_mdn))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
