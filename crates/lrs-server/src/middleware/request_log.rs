//! Request URL logging for the `ShowUrls` setting.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

/// Tracing target for request lines.
pub const REQUEST_LOG_TARGET: &str = "lrs::requests";

/// Full URL of a request as the browser sent it.
pub(crate) fn request_url(req: &Request, scheme: &str) -> String {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str());

    format!("{scheme}://{host}{path_and_query}")
}

/// Log every request URL before handling it.
pub(crate) async fn log_request(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    tracing::info!(
        target: REQUEST_LOG_TARGET,
        "{} {}",
        req.method(),
        request_url(&req, state.config.scheme())
    );
    next.run(req).await
}
