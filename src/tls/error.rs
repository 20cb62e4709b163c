//! TLS errors

use openssl::error::ErrorStack;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// TLS errors
///
/// Context construction errors name the step that failed. Dial-time errors
/// carry the low-level diagnostic (socket error, OpenSSL error queue and
/// certificate verification result).
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("couldn't set FIPS mode to {requested}: {reason}")]
    FipsConfig { requested: bool, reason: String },

    #[error("failure creating new openssl context: {0}")]
    ContextCreation(#[source] ErrorStack),

    #[error("set_cipher_list: {0}")]
    CipherPolicy(#[source] ErrorStack),

    #[error("use_certificate_chain_file({}): {source}", path.display())]
    CertificateLoad { path: PathBuf, source: ErrorStack },

    #[error("use_private_key_file({}): {reason}", path.display())]
    PrivateKeyLoad { path: PathBuf, reason: String },

    #[error("check_private_key({}): {reason}", path.display())]
    KeyMismatch { path: PathBuf, reason: String },

    #[error("load_client_ca_file({}): {source}", path.display())]
    CaFileLoad { path: PathBuf, source: ErrorStack },

    #[error("load_verify_locations({}): {source}", path.display())]
    VerifyLocations { path: PathBuf, source: ErrorStack },

    #[error("load_crl_file({}): {reason}", path.display())]
    CrlLoad { path: PathBuf, reason: String },

    #[error("failed to resolve {addr}: {source}")]
    Resolve { addr: String, source: io::Error },

    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("timed out after {timeout:?} connecting to {addr}")]
    Timeout { addr: String, timeout: Duration },

    #[error("handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("connector is not configured")]
    NotConfigured,
}

impl TlsError {
    /// Whether this error is a dial timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TlsError::Timeout { .. })
    }

    /// Name of the context construction step that failed, if any
    pub fn step(&self) -> Option<&'static str> {
        let step = match self {
            TlsError::FipsConfig { .. } => "fips_mode_set",
            TlsError::ContextCreation(_) => "new_context",
            TlsError::CipherPolicy(_) => "set_cipher_list",
            TlsError::CertificateLoad { .. } => "use_certificate_chain_file",
            TlsError::PrivateKeyLoad { .. } => "use_private_key_file",
            TlsError::KeyMismatch { .. } => "check_private_key",
            TlsError::CaFileLoad { .. } => "load_client_ca_file",
            TlsError::VerifyLocations { .. } => "load_verify_locations",
            TlsError::CrlLoad { .. } => "load_crl_file",
            _ => return None,
        };
        Some(step)
    }
}
