//! Server errors.

use std::io;

/// Fatal server error.
///
/// Everything else (watcher failures, dead clients, broken extension units)
/// is logged and absorbed while the server keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listening socket could not be bound.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Requested address.
        address: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// TLS was requested without a certificate and key.
    #[error("UseSsl requires both CertFile and KeyFile")]
    TlsMaterialMissing,
    /// TLS certificate or key could not be loaded.
    #[error("Failed to load TLS certificate: {0}")]
    Tls(#[source] io::Error),
    /// Server I/O error.
    #[error("Server error: {0}")]
    Io(#[from] io::Error),
}
