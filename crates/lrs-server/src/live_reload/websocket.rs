//! WebSocket handler for live reload.
//!
//! Registers each connection with the [`ClientRegistry`] and forwards reload
//! signals as JSON text frames.

use std::path::{Component, Path};
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lrs_watch::{ReloadScope, ReloadSignal};
use serde::Serialize;

use super::registry::ClientRegistry;
use crate::state::AppState;

/// Message sent to connected clients when files change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct ReloadMessage {
    /// Event type (always "reload").
    #[serde(rename = "type")]
    event_type: &'static str,
    /// What the client should refresh.
    scope: ReloadScope,
    /// URL paths of the changed files.
    paths: Vec<String>,
}

impl ReloadMessage {
    pub(crate) fn new(signal: &ReloadSignal, web_root: &Path) -> Self {
        Self {
            event_type: "reload",
            scope: signal.scope,
            paths: signal
                .paths
                .iter()
                .filter_map(|path| url_path(path, web_root))
                .collect(),
        }
    }
}

/// URL path of a file beneath the web root, e.g. `/css/site.css`.
fn url_path(file: &Path, web_root: &Path) -> Option<String> {
    let relative = file.strip_prefix(web_root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(format!("/{}", segments.join("/")))
}

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(registry) = state.live_reload.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, registry, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, registry: Arc<ClientRegistry>, state: Arc<AppState>) {
    let mut subscription = registry.register();
    let id = subscription.id();

    loop {
        tokio::select! {
            signal = subscription.recv() => {
                let Some(signal) = signal else {
                    // Registry let go of us: server is shutting down.
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                let message = ReloadMessage::new(&signal, &state.config.web_root);
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(error = %err, "Failed to serialize reload message");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            // Client frames are only keepalives
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    registry.unregister(id);
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_reload_message_serialization() {
        let signal = ReloadSignal {
            scope: ReloadScope::StyleOnly,
            paths: vec![PathBuf::from("/site/css/app.css")],
        };

        let json = serde_json::to_value(ReloadMessage::new(&signal, Path::new("/site"))).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"type": "reload", "scope": "style", "paths": ["/css/app.css"]})
        );
    }

    #[test]
    fn test_full_scope_serialization() {
        let signal = ReloadSignal {
            scope: ReloadScope::Full,
            paths: vec![PathBuf::from("/site/index.html")],
        };

        let json = serde_json::to_value(ReloadMessage::new(&signal, Path::new("/site"))).unwrap();

        assert_eq!(json["scope"], "full");
        assert_eq!(json["paths"][0], "/index.html");
    }

    #[test]
    fn test_paths_outside_web_root_are_skipped() {
        assert_eq!(url_path(Path::new("/elsewhere/a.css"), Path::new("/site")), None);
        assert_eq!(
            url_path(Path::new("/site/nested/page.html"), Path::new("/site")),
            Some("/nested/page.html".to_owned())
        );
    }
}
