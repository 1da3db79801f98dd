//! TLS setup for `UseSsl`.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use lrs_config::Configuration;

use crate::error::ServerError;

/// Load the configured PEM certificate and key.
///
/// # Errors
///
/// Returns [`ServerError::TlsMaterialMissing`] when either path is unset and
/// [`ServerError::Tls`] when the files cannot be read or parsed.
pub(crate) async fn load_tls_config(config: &Configuration) -> Result<RustlsConfig, ServerError> {
    let (Some(cert), Some(key)) = (&config.cert_file, &config.key_file) else {
        return Err(ServerError::TlsMaterialMissing);
    };
    load_pem(cert, key).await
}

async fn load_pem(cert: &Path, key: &Path) -> Result<RustlsConfig, ServerError> {
    tracing::debug!(cert = %cert.display(), key = %key.display(), "Loading TLS certificate");
    RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(ServerError::Tls)
}
