//! Pluggable page renderer.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::ExtensionError;

/// A page renderer the server can route requests through.
pub trait Renderer: Send + Sync {
    /// Page extension this renderer handles, with a leading dot.
    fn extension(&self) -> &str;

    /// Register an extension unit, returning the type names it exports.
    fn register_unit(&self, path: &Path) -> Result<Vec<String>, ExtensionError>;

    /// Render a page file to HTML.
    fn render(&self, page: &Path) -> Result<String, ExtensionError>;
}

/// Renderer that keeps registered units as reference paths and serves page
/// files as HTML text.
///
/// Each unit exports a single name: its file stem.
pub struct ReferenceRenderer {
    extension: String,
    reference_paths: Mutex<Vec<PathBuf>>,
}

impl ReferenceRenderer {
    /// Create a renderer for pages with the given extension.
    #[must_use]
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            reference_paths: Mutex::new(Vec::new()),
        }
    }

    /// Units registered so far.
    #[must_use]
    pub fn reference_paths(&self) -> Vec<PathBuf> {
        self.reference_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Renderer for ReferenceRenderer {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn register_unit(&self, path: &Path) -> Result<Vec<String>, ExtensionError> {
        let io_error = |source| ExtensionError::Io {
            path: path.to_path_buf(),
            source,
        };

        let metadata = std::fs::metadata(path).map_err(io_error)?;
        if !metadata.is_file() {
            return Err(ExtensionError::Rejected {
                path: path.to_path_buf(),
                message: "not a regular file".to_owned(),
            });
        }
        File::open(path).map_err(io_error)?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| ExtensionError::Rejected {
                path: path.to_path_buf(),
                message: "missing file name".to_owned(),
            })?;

        self.reference_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());

        Ok(vec![stem])
    }

    fn render(&self, page: &Path) -> Result<String, ExtensionError> {
        std::fs::read_to_string(page).map_err(|source| ExtensionError::Io {
            path: page.to_path_buf(),
            source,
        })
    }
}
