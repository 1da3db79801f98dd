//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;

use crate::live_reload::{self, CLIENT_SCRIPT_PATH, WS_PATH};
use crate::middleware::{inject, request_log};
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// Request flow, outermost first: request logging (`ShowUrls`), agent
/// injection (live reload), default documents, renderer pages, then the
/// live reload routes or the file service.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    if state.live_reload_enabled() {
        router = router
            .route(WS_PATH, get(live_reload::ws_handler))
            .route(CLIENT_SCRIPT_PATH, get(live_reload::client_script));
    }

    router = router.fallback_service(static_files::serve_dir(&state.config));

    if state.renderer.is_some() {
        router = router.layer(from_fn_with_state(
            Arc::clone(&state),
            static_files::render_pages,
        ));
    }

    router = router.layer(from_fn_with_state(
        Arc::clone(&state),
        static_files::default_documents,
    ));

    if state.live_reload_enabled() {
        router = router.layer(from_fn(inject::inject_livereload));
    }

    if state.config.show_request_urls {
        router = router.layer(from_fn_with_state(
            Arc::clone(&state),
            request_log::log_request,
        ));
    }

    router.with_state(state)
}
