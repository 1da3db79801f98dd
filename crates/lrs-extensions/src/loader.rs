//! Extension unit discovery.
//!
//! Scans the private extension directory beneath the web root and registers
//! each dynamic library found there with the renderer. Units are discovered
//! once at startup and are not reloaded.

use std::fs;
use std::path::{Path, PathBuf};

use crate::renderer::Renderer;

/// Name of the extension directory beneath the web root.
pub const PRIVATE_BIN_DIR: &str = "PrivateBin";

/// Outcome of registering one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// Registered; `exports` lists the type names the unit provides.
    Loaded {
        /// Exported type names.
        exports: Vec<String>,
    },
    /// Registration failed.
    Failed {
        /// Diagnostic message.
        message: String,
    },
}

/// A discovered extension unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionAssembly {
    /// Path of the unit file.
    pub path: PathBuf,
    /// Load outcome.
    pub status: LoadStatus,
}

impl ExtensionAssembly {
    /// Whether the unit was registered successfully.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.status, LoadStatus::Loaded { .. })
    }

    /// Exported type names (empty for failed units).
    #[must_use]
    pub fn exports(&self) -> &[String] {
        match &self.status {
            LoadStatus::Loaded { exports } => exports,
            LoadStatus::Failed { .. } => &[],
        }
    }
}

/// Whether a file has the platform's dynamic library extension.
#[must_use]
pub fn is_load_unit(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(std::env::consts::DLL_EXTENSION))
}

/// Discover and register extension units under `web_root`.
///
/// Only the top level of the extension directory is scanned. A missing
/// directory yields an empty list. A unit that fails to register is recorded
/// as [`LoadStatus::Failed`] and does not stop the remaining units.
pub fn discover(web_root: &Path, renderer: &dyn Renderer) -> Vec<ExtensionAssembly> {
    let dir = web_root.join(PRIVATE_BIN_DIR);
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| !t.is_dir()))
        .map(|e| e.path())
        .filter(|path| is_load_unit(path))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let status = match renderer.register_unit(&path) {
                Ok(exports) => {
                    tracing::info!(path = %path.display(), "Registered extension unit");
                    LoadStatus::Loaded { exports }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to load extension unit");
                    LoadStatus::Failed {
                        message: err.to_string(),
                    }
                }
            };
            ExtensionAssembly { path, status }
        })
        .collect()
}
