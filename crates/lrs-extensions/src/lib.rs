//! Extension units and the pluggable page renderer.
//!
//! When the renderer is enabled, the server routes renderer pages through a
//! [`Renderer`] and registers any dynamic libraries found in the web root's
//! `PrivateBin` directory with it ([`discover`]). Units are registered
//! independently, so one broken unit never blocks the others.
//!
//! [`resolve_type`] looks a type name up directly first and then scans the
//! loaded units in discovery order.

mod loader;
mod renderer;
mod resolve;

use std::path::PathBuf;

pub use loader::{ExtensionAssembly, LoadStatus, PRIVATE_BIN_DIR, discover, is_load_unit};
pub use renderer::{ReferenceRenderer, Renderer};
pub use resolve::{TypeLookup, TypeResolution, resolve_type};

/// Extension or rendering error.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// I/O error on a unit or page file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The renderer refused the unit.
    #[error("Cannot load {}: {message}", path.display())]
    Rejected {
        /// Unit file.
        path: PathBuf,
        /// Reason.
        message: String,
    },
}
