//! PostgreSQL TLS support
//!
//! Builds `native-tls` connectors for tokio-postgres from a `PostgresConfig`.

use native_tls::{Certificate, Identity, TlsConnector as NativeTlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::{PostgresConfig, SslMode};

/// Error types for TLS operations
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Failed to load CA certificate
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaCertLoadFailed {
        path: String,
        source: std::io::Error,
    },

    /// Invalid CA certificate format
    #[error("Invalid CA certificate format: {0}")]
    InvalidCaCert(String),

    /// Failed to load client certificate or key
    #[error("Failed to load client credentials from {path}: {source}")]
    ClientCredentialsLoadFailed {
        path: String,
        source: std::io::Error,
    },

    /// Invalid client identity format
    #[error("Invalid client identity (cert + key): {0}")]
    InvalidClientIdentity(String),

    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    ConfigurationError(String),

    /// TLS requested while the mode disables it
    #[error("TLS mode {0:?} does not use a TLS connector")]
    UnsupportedMode(SslMode),
}

/// A PostgreSQL TLS connector builder
#[derive(Debug, Clone)]
pub struct PostgresTlsConnector;

impl PostgresTlsConnector {
    /// Build a TLS connector for the configured mode and certificates.
    ///
    /// `require` without a CA certificate accepts any server certificate, the
    /// same as libpq; `verify-ca` checks the chain but not the hostname.
    pub fn build(config: &PostgresConfig) -> Result<MakeTlsConnector, TlsError> {
        info!(mode = config.ssl_mode.as_str(), "building PostgreSQL TLS connector");

        let mut builder = NativeTlsConnector::builder();

        match config.ssl_mode {
            SslMode::Disable => return Err(TlsError::UnsupportedMode(config.ssl_mode)),
            SslMode::Prefer | SslMode::Require => {
                if config.ssl_ca_cert.is_none() {
                    builder.danger_accept_invalid_certs(true);
                }
                builder.danger_accept_invalid_hostnames(true);
            }
            SslMode::VerifyCa => {
                builder.danger_accept_invalid_hostnames(true);
            }
            SslMode::VerifyFull => {}
        }

        if let Some(ca_cert_path) = &config.ssl_ca_cert {
            apply_ca_cert(&mut builder, ca_cert_path)?;
        }

        if let (Some(cert_path), Some(key_path)) = (&config.ssl_client_cert, &config.ssl_client_key)
        {
            apply_client_cert(&mut builder, cert_path, key_path)?;
        }

        let connector = builder
            .build()
            .map_err(|e| TlsError::ConfigurationError(e.to_string()))?;

        debug!("TLS connector built successfully");
        Ok(MakeTlsConnector::new(connector))
    }
}

fn apply_ca_cert(builder: &mut TlsConnectorBuilder, path: &Path) -> Result<(), TlsError> {
    debug!(path = %path.display(), "loading CA certificate");

    let pem_data = fs::read(path).map_err(|e| TlsError::CaCertLoadFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    let cert =
        Certificate::from_pem(&pem_data).map_err(|e| TlsError::InvalidCaCert(e.to_string()))?;

    builder.add_root_certificate(cert);
    Ok(())
}

fn apply_client_cert(
    builder: &mut TlsConnectorBuilder,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), TlsError> {
    debug!(
        cert_path = %cert_path.display(),
        key_path = %key_path.display(),
        "loading client certificate and key"
    );

    let read = |path: &Path| {
        fs::read(path).map_err(|e| TlsError::ClientCredentialsLoadFailed {
            path: path.display().to_string(),
            source: e,
        })
    };
    let cert_pem = read(cert_path)?;
    let key_pem = read(key_path)?;

    // native-tls Identity::from_pkcs8 expects PEM cert and PEM key
    let identity = Identity::from_pkcs8(&cert_pem, &key_pem)
        .map_err(|e| TlsError::InvalidClientIdentity(e.to_string()))?;
    builder.identity(identity);
    Ok(())
}
