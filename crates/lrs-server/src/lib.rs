//! HTTP server with live reload for static sites.
//!
//! Serves a web root over HTTP(S) and refreshes connected browsers when
//! watched files change:
//! - Static files from the web root, with default documents for directories
//! - Renderer pages through a pluggable [`Renderer`] (optional)
//! - WebSocket endpoint and agent script for live reload
//!
//! # Quick Start
//!
//! ```ignore
//! use lrs_config::{SettingsLayer, resolve};
//! use lrs_server::LiveReloadServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cwd = std::env::current_dir().unwrap();
//!     let config = resolve(
//!         &SettingsLayer::defaults(),
//!         &SettingsLayer::new(),
//!         &SettingsLayer::from_env(),
//!         &cwd,
//!     );
//!
//!     LiveReloadServer::new(config).run().await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server (lrs-server)
//!                        │
//!                        ├─► Request log ─► Agent injection ─► Default documents
//!                        │                                          │
//!                        │                    Renderer pages ◄──────┤
//!                        │                    ServeDir (web root) ◄─┘
//!                        │
//!                        └─► WebSocket ◄── ClientRegistry ◄── ReloadBroadcaster
//!                                                                   │
//!                              ChangeWatcher ──► Debouncer ─────────┘
//! ```

mod app;
mod error;
mod live_reload;
mod middleware;
mod state;
mod static_files;
mod tls;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lrs_config::{Configuration, RENDERER_EXTENSION};
use lrs_extensions::{
    ExtensionAssembly, ReferenceRenderer, Renderer, TypeLookup, TypeResolution, resolve_type,
};
use tokio::net::TcpListener;
use tokio::sync::watch;

pub use error::ServerError;
pub use live_reload::{
    BroadcastReport, CLIENT_SCRIPT_PATH, ClientConnection, ClientRegistry, ClientSubscription,
    ConnectionState, ReloadBroadcaster, WS_PATH,
};
pub use middleware::inject::{SCRIPT_TAG, inject_script};
pub use middleware::request_log::REQUEST_LOG_TARGET;

use live_reload::LiveReloadManager;
use state::AppState;

/// How long TLS connections get to finish after shutdown is requested.
const TLS_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Live reload server for one resolved configuration.
pub struct LiveReloadServer {
    config: Arc<Configuration>,
    renderer: Option<Arc<dyn Renderer>>,
    extension_units: Vec<ExtensionAssembly>,
}

impl LiveReloadServer {
    /// Create a server. When the renderer is enabled, the built-in
    /// [`ReferenceRenderer`] is used and extension units are discovered.
    #[must_use]
    pub fn new(config: Configuration) -> Self {
        let renderer: Option<Arc<dyn Renderer>> = config
            .renderer_enabled
            .then(|| Arc::new(ReferenceRenderer::new(RENDERER_EXTENSION)) as Arc<dyn Renderer>);
        Self::build(config, renderer)
    }

    /// Create a server with a custom renderer.
    ///
    /// The renderer is only used when the configuration enables it.
    #[must_use]
    pub fn with_renderer(config: Configuration, renderer: Arc<dyn Renderer>) -> Self {
        let renderer = config.renderer_enabled.then_some(renderer);
        Self::build(config, renderer)
    }

    fn build(config: Configuration, renderer: Option<Arc<dyn Renderer>>) -> Self {
        let extension_units = renderer
            .as_deref()
            .map(|r| lrs_extensions::discover(&config.web_root, r))
            .unwrap_or_default();

        Self {
            config: Arc::new(config),
            renderer,
            extension_units,
        }
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Extension units discovered at startup.
    #[must_use]
    pub fn extension_units(&self) -> &[ExtensionAssembly] {
        &self.extension_units
    }

    /// Resolve a type name against `direct`, then the discovered units.
    #[must_use]
    pub fn resolve_type(&self, name: &str, direct: &dyn TypeLookup) -> TypeResolution<'_> {
        resolve_type(name, direct, &self.extension_units)
    }

    /// Run until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or TLS material cannot
    /// be loaded.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(ctrl_c()).await
    }

    /// Run until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or TLS material cannot
    /// be loaded.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = if self.config.use_tls {
            Listener::Tls(tls::load_tls_config(&self.config).await?)
        } else {
            let address = self.config.bind_address();
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| ServerError::Bind { address, source })?;
            Listener::Plain(listener)
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut manager = None;
        let live_reload = if self.config.live_reload_enabled {
            let mut live_reload = LiveReloadManager::new(&self.config, shutdown_rx);
            match live_reload.start() {
                Ok(()) => {
                    let registry = live_reload.registry();
                    manager = Some(live_reload);
                    Some(registry)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Cannot watch web root, serving without live reload");
                    None
                }
            }
        } else {
            None
        };

        let state = Arc::new(AppState {
            config: Arc::clone(&self.config),
            live_reload: live_reload.clone(),
            renderer: self.renderer.clone(),
        });
        let app = app::create_router(state);

        let stop = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received, stopping server...");
            let _ = shutdown_tx.send(true);
            if let Some(registry) = live_reload {
                registry.close_all();
            }
        };

        tracing::info!(address = %self.config.bind_address(), url = %self.config.site_url(), "Starting server");

        let result = match listener {
            Listener::Plain(listener) => axum::serve(listener, app)
                .with_graceful_shutdown(stop)
                .await
                .map_err(ServerError::from),
            Listener::Tls(tls) => serve_tls(&self.config, app, tls, stop).await,
        };

        if let Some(manager) = manager {
            manager.stop().await;
        }

        result
    }
}

enum Listener {
    Plain(TcpListener),
    Tls(axum_server::tls_rustls::RustlsConfig),
}

async fn serve_tls<F>(
    config: &Configuration,
    app: axum::Router,
    tls: axum_server::tls_rustls::RustlsConfig,
    stop: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = config.bind_address();
    let bind_error = |source: std::io::Error| ServerError::Bind {
        address: address.clone(),
        source,
    };

    let socket_addr = tokio::net::lookup_host(&address)
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "host did not resolve",
            ))
        })?;

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            stop.await;
            handle.graceful_shutdown(Some(TLS_GRACE_PERIOD));
        }
    });

    axum_server::bind_rustls(socket_addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(bind_error)
}

/// Wait for shutdown signal (Ctrl-C).
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use futures_util::StreamExt;
    use lrs_config::{SettingsLayer, resolve_layers};
    use lrs_watch::{ChangeEvent, ChangeKind, ChangeStream, WatchItem};
    use tokio_tungstenite::tungstenite::Message;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config_for(root: &Path, pairs: &[(&str, &str)]) -> Configuration {
        let mut layer = SettingsLayer::from_pairs(pairs.iter().copied());
        layer.set("WebRoot", root.to_string_lossy());
        resolve_layers(&[&SettingsLayer::defaults(), &layer], root)
    }

    #[test]
    fn test_renderer_discovery_follows_configuration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bin = temp_dir.path().join(lrs_extensions::PRIVATE_BIN_DIR);
        std::fs::create_dir(&bin).unwrap();
        let unit = bin.join(format!("widgets.{}", std::env::consts::DLL_EXTENSION));
        std::fs::write(&unit, b"\0").unwrap();

        let disabled = LiveReloadServer::new(config_for(temp_dir.path(), &[]));
        let enabled = LiveReloadServer::new(config_for(temp_dir.path(), &[("UseRenderer", "true")]));

        assert!(disabled.extension_units().is_empty());
        assert_eq!(enabled.extension_units().len(), 1);
        assert!(enabled.extension_units()[0].is_loaded());
        assert_eq!(
            enabled.resolve_type("widgets", &|_: &str| false),
            TypeResolution::Unit(&enabled.extension_units()[0])
        );
        assert_eq!(
            enabled.resolve_type("String", &|name: &str| name == "String"),
            TypeResolution::Direct
        );
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port().to_string();
        let server = LiveReloadServer::new(config_for(temp_dir.path(), &[("Port", port.as_str())]));

        let result = server.run_until(std::future::pending()).await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_tls_without_material_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = LiveReloadServer::new(config_for(temp_dir.path(), &[("UseSsl", "true")]));

        let result = server.run_until(std::future::pending()).await;

        assert!(matches!(result, Err(ServerError::TlsMaterialMissing)));
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let temp_dir = tempfile::tempdir().unwrap();
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port().to_string();
        drop(probe);
        let server = LiveReloadServer::new(config_for(temp_dir.path(), &[("Port", port.as_str())]));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(server.run_until(async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    async fn next_text<S>(socket: &mut S) -> serde_json::Value
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let message = tokio::time::timeout(TIMEOUT, socket.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_changes_reach_browser_as_reload_messages() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("index.html"), "<body></body>").unwrap();
        std::fs::write(temp_dir.path().join("site.css"), "").unwrap();
        let config = Arc::new(config_for(temp_dir.path(), &[("DebounceMs", "50")]));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut manager = LiveReloadManager::new(&config, shutdown_rx);
        let (events, stream) = ChangeStream::channel(16);
        manager.start_with_stream(stream);
        let registry = manager.registry();

        let app = app::create_router(Arc::new(AppState {
            config: Arc::clone(&config),
            live_reload: Some(Arc::clone(&registry)),
            renderer: None,
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{WS_PATH}"))
            .await
            .unwrap();
        tokio::time::timeout(TIMEOUT, async {
            while registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let change = |name: &str| {
            WatchItem::Change(ChangeEvent::new(
                config.web_root.join(name),
                ChangeKind::Modified,
            ))
        };

        events.send(change("site.css")).await.unwrap();
        assert_eq!(
            next_text(&mut socket).await,
            serde_json::json!({"type": "reload", "scope": "style", "paths": ["/site.css"]})
        );

        events.send(change("index.html")).await.unwrap();
        assert_eq!(
            next_text(&mut socket).await,
            serde_json::json!({"type": "reload", "scope": "full", "paths": ["/index.html"]})
        );

        shutdown_tx.send(true).unwrap();
        manager.stop().await;
        let closing = tokio::time::timeout(TIMEOUT, socket.next()).await.unwrap();
        assert!(matches!(closing, Some(Ok(Message::Close(_))) | None));
    }
}
