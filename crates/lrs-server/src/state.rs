//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use lrs_config::Configuration;
use lrs_extensions::Renderer;

use crate::live_reload::ClientRegistry;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Resolved configuration.
    pub(crate) config: Arc<Configuration>,
    /// Connected clients (if live reload is running).
    pub(crate) live_reload: Option<Arc<ClientRegistry>>,
    /// Page renderer (if enabled).
    pub(crate) renderer: Option<Arc<dyn Renderer>>,
}

impl AppState {
    /// Check if live reload is running.
    #[must_use]
    pub(crate) fn live_reload_enabled(&self) -> bool {
        self.live_reload.is_some()
    }
}
