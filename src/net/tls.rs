//! TLS certificate loading for the control API listener.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the rustls configuration named by `tls`.
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    let cert_path = Path::new(&tls.cert_path);
    let key_path = Path::new(&tls.key_path);

    for (label, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{label} file not found: {}", path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}
