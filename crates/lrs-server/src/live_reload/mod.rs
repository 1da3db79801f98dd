//! Live reload: client registry, broadcasting, the WebSocket channel and the
//! browser agent script.

mod broadcaster;
mod manager;
mod registry;
mod websocket;

use axum::http::header;
use axum::response::IntoResponse;

pub use broadcaster::{BroadcastReport, ReloadBroadcaster};
pub(crate) use manager::LiveReloadManager;
pub use registry::{ClientConnection, ClientRegistry, ClientSubscription, ConnectionState};
pub(crate) use websocket::ws_handler;

/// WebSocket endpoint path.
pub const WS_PATH: &str = "/__livereload/ws";

/// Client agent script path.
pub const CLIENT_SCRIPT_PATH: &str = "/__livereload/client.js";

/// Browser agent source.
pub(crate) const CLIENT_SCRIPT: &str = include_str!("client.js");

/// Serve the browser agent.
pub(crate) async fn client_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_SCRIPT,
    )
}
