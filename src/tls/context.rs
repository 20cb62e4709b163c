//! TLS context construction
//!
//! Builds the one client context a connector uses for all of its dials. The
//! build runs a fixed sequence of steps and stops at the first failure; a
//! partially configured context is never returned.

use super::error::TlsError;
use super::fips;
use crate::options::SecurityOptions;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{
    SslContext, SslContextBuilder, SslContextRef, SslFiletype, SslMethod, SslMode, SslOptions,
    SslSessionCacheMode, SslVerifyMode,
};
use openssl::x509::store::X509Lookup;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509Name, X509};
use std::fmt;
use std::fs;
use std::path::Path;

/// Cipher policy applied to every context (TLS 1.2 and below)
///
/// - `HIGH`: strong ciphers only
/// - `!EXPORT`: no export-grade (40/56 bit) ciphers
/// - `!aNULL`: no anonymous authentication
/// - `@STRENGTH`: order by strength
pub const CIPHER_LIST: &str = "HIGH:!EXPORT:!aNULL:@STRENGTH";

/// What a built context was configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextPolicy {
    /// Client certificate chain and key installed
    pub client_cert: bool,
    /// Trust anchors loaded from a CA file
    pub trust_store: bool,
    /// Server certificate chain is verified during the handshake
    pub verify_peer: bool,
    /// Number of CA names loaded into the client CA list
    pub client_ca_names: usize,
    /// Revocation checking against a CRL file
    pub crl_check: bool,
}

/// Immutable TLS client context
///
/// Cloning is cheap and shares the underlying OpenSSL context, which is
/// released when the last clone is dropped.
#[derive(Clone)]
pub struct TlsContext {
    ctx: SslContext,
    options: SslOptions,
    policy: ContextPolicy,
}

impl TlsContext {
    /// Build a client context from security options
    ///
    /// Also applies the process-wide FIPS setting; see [`fips::ensure_fips_mode`].
    pub fn build(opts: &SecurityOptions) -> Result<Self, TlsError> {
        fips::ensure_fips_mode(opts.fips_mode)?;

        let mut builder =
            SslContextBuilder::new(SslMethod::tls()).map_err(TlsError::ContextCreation)?;
        let mut policy = ContextPolicy::default();

        // Bug workarounds on, SSLv2 off
        builder.set_options(SslOptions::ALL | SslOptions::NO_SSLV2);

        builder
            .set_cipher_list(CIPHER_LIST)
            .map_err(TlsError::CipherPolicy)?;
        tracing::debug!(ciphers = CIPHER_LIST, "cipher policy set");

        if let Some(path) = opts.pem_key_file_path() {
            load_key_pair(&mut builder, path, opts.pem_password())?;
            policy.client_cert = true;
            tracing::debug!(path = %path.display(), "client certificate loaded");
        }

        // Blocking reads and writes finish renegotiation before returning
        builder.set_mode(SslMode::AUTO_RETRY);

        // No session resumption: every connection verifies the full chain
        builder.set_session_cache_mode(SslSessionCacheMode::OFF);
        builder.set_options(SslOptions::NO_TICKET);

        if let Some(path) = opts.ca_file_path() {
            let names = X509Name::load_client_ca_file(path).map_err(|source| {
                TlsError::CaFileLoad {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            policy.client_ca_names = names.len();
            builder.set_client_ca_list(names);

            builder
                .set_ca_file(path)
                .map_err(|source| TlsError::VerifyLocations {
                    path: path.to_path_buf(),
                    source,
                })?;
            policy.trust_store = true;

            if opts.allow_invalid_cert {
                builder.set_verify(SslVerifyMode::NONE);
            } else {
                builder.set_verify(SslVerifyMode::PEER);
                policy.verify_peer = true;
            }
            tracing::debug!(
                path = %path.display(),
                verify_peer = policy.verify_peer,
                "trust store loaded"
            );
        }

        if let Some(path) = opts.crl_file_path() {
            load_crl(&mut builder, path)?;
            policy.crl_check = true;
            tracing::debug!(path = %path.display(), "revocation list loaded");
        }

        let options = builder.options();
        Ok(TlsContext {
            ctx: builder.build(),
            options,
            policy,
        })
    }

    /// Underlying OpenSSL context
    pub fn ssl_context(&self) -> &SslContextRef {
        &self.ctx
    }

    /// Protocol options the context was built with
    pub fn options(&self) -> SslOptions {
        self.options
    }

    /// Which optional build steps ran
    pub fn policy(&self) -> ContextPolicy {
        self.policy
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Install the certificate chain and private key from one PEM file
fn load_key_pair(
    builder: &mut SslContextBuilder,
    path: &Path,
    password: Option<&str>,
) -> Result<(), TlsError> {
    builder
        .set_certificate_chain_file(path)
        .map_err(|source| TlsError::CertificateLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let key_load_err = |reason: String| TlsError::PrivateKeyLoad {
        path: path.to_path_buf(),
        reason,
    };
    let pem = fs::read(path).map_err(|e| key_load_err(e.to_string()))?;
    let key = parse_private_key(&pem, password).map_err(|e| key_load_err(e.to_string()))?;

    let mismatch = |reason: String| TlsError::KeyMismatch {
        path: path.to_path_buf(),
        reason,
    };
    let leaf = X509::from_pem(&pem).map_err(|e| mismatch(e.to_string()))?;
    let cert_key = leaf.public_key().map_err(|e| mismatch(e.to_string()))?;
    if !cert_key.public_eq(&key) {
        return Err(mismatch(
            "private key does not match the certificate public key".to_string(),
        ));
    }

    builder
        .set_private_key(&key)
        .map_err(|e| key_load_err(e.to_string()))?;
    builder
        .check_private_key()
        .map_err(|e| mismatch(e.to_string()))
}

/// Parse the first private key in a PEM buffer
///
/// Without a password an encrypted key fails instead of prompting. A password
/// given for an unencrypted key is ignored.
fn parse_private_key(
    pem: &[u8],
    password: Option<&str>,
) -> Result<PKey<Private>, openssl::error::ErrorStack> {
    match password {
        Some(password) => PKey::private_key_from_pem_passphrase(pem, password.as_bytes()),
        None => PKey::private_key_from_pem_callback(pem, |_buf| Ok(0)),
    }
}

/// Turn on CRL checking and load the revocation list
fn load_crl(builder: &mut SslContextBuilder, path: &Path) -> Result<(), TlsError> {
    let crl_err = |reason: String| TlsError::CrlLoad {
        path: path.to_path_buf(),
        reason,
    };

    let store = builder.cert_store_mut();
    store
        .set_flags(X509VerifyFlags::CRL_CHECK)
        .map_err(|e| crl_err(e.to_string()))?;
    let lookup = store
        .add_lookup(X509Lookup::file())
        .map_err(|e| crl_err(format!("add_lookup: {}", e)))?;

    let loaded = lookup
        .load_crl_file(path, SslFiletype::PEM)
        .map_err(|e| crl_err(e.to_string()))?;
    if loaded == 0 {
        return Err(crl_err("no revocation lists found".to_string()));
    }
    Ok(())
}
