//! Security options
//!
//! The input record the connector reacts to. Options arrive already parsed
//! from the command line; this module only provides the record, its defaults
//! and a few derived values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on connection establishment (TCP connect and TLS handshake)
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Authentication fields passed through to the session layer
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    pub username: String,
    pub password: String,
    /// Authentication database
    pub source: String,
    /// Authentication mechanism (e.g. "SCRAM-SHA-256")
    pub mechanism: String,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("source", &self.source)
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Transport security options
///
/// Empty paths are treated the same as absent ones.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityOptions {
    /// Host list, optionally prefixed with a replica set name (`rs0/h1,h2`)
    pub host: String,
    /// Port applied to every host; `None` keeps per-host ports
    pub port: Option<u16>,
    pub fips_mode: bool,
    pub allow_invalid_cert: bool,
    pub allow_invalid_hostname: bool,
    pub ca_file: Option<PathBuf>,
    /// PEM file holding the client certificate chain and private key
    pub pem_key_file: Option<PathBuf>,
    pub pem_key_password: Option<String>,
    pub crl_file: Option<PathBuf>,
    pub auth: AuthOptions,
    /// Namespace database, used as the authentication database fallback
    pub db: Option<String>,
    pub dial_timeout: Duration,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        SecurityOptions {
            host: String::new(),
            port: None,
            fips_mode: false,
            allow_invalid_cert: false,
            allow_invalid_hostname: false,
            ca_file: None,
            pem_key_file: None,
            pem_key_password: None,
            crl_file: None,
            auth: AuthOptions::default(),
            db: None,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

impl SecurityOptions {
    /// Create options targeting the given host list
    pub fn new(host: impl Into<String>) -> Self {
        SecurityOptions {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn fips_mode(mut self, enabled: bool) -> Self {
        self.fips_mode = enabled;
        self
    }

    /// Accept server certificates that fail chain verification
    pub fn allow_invalid_cert(mut self, allow: bool) -> Self {
        self.allow_invalid_cert = allow;
        self
    }

    /// Accept server certificates whose names do not match the host
    pub fn allow_invalid_hostname(mut self, allow: bool) -> Self {
        self.allow_invalid_hostname = allow;
        self
    }

    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn pem_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pem_key_file = Some(path.into());
        self
    }

    pub fn pem_key_password(mut self, password: impl Into<String>) -> Self {
        self.pem_key_password = Some(password.into());
        self
    }

    pub fn crl_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.crl_file = Some(path.into());
        self
    }

    pub fn auth(mut self, auth: AuthOptions) -> Self {
        self.auth = auth;
        self
    }

    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.db = Some(db.into());
        self
    }

    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// CA file path, if one was given
    pub fn ca_file_path(&self) -> Option<&Path> {
        non_empty_path(&self.ca_file)
    }

    /// PEM key file path, if one was given
    pub fn pem_key_file_path(&self) -> Option<&Path> {
        non_empty_path(&self.pem_key_file)
    }

    /// CRL file path, if one was given
    pub fn crl_file_path(&self) -> Option<&Path> {
        non_empty_path(&self.crl_file)
    }

    /// PEM key password, if a non-empty one was given
    pub fn pem_password(&self) -> Option<&str> {
        self.pem_key_password.as_deref().filter(|p| !p.is_empty())
    }

    /// Database to authenticate against
    ///
    /// The explicit auth source wins, then the namespace database, otherwise
    /// empty (the session layer picks its own default).
    pub fn authentication_database(&self) -> &str {
        if !self.auth.source.is_empty() {
            return &self.auth.source;
        }
        match self.db.as_deref() {
            Some(db) if !db.is_empty() => db,
            _ => "",
        }
    }
}

impl fmt::Debug for SecurityOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("fips_mode", &self.fips_mode)
            .field("allow_invalid_cert", &self.allow_invalid_cert)
            .field("allow_invalid_hostname", &self.allow_invalid_hostname)
            .field("ca_file", &self.ca_file)
            .field("pem_key_file", &self.pem_key_file)
            .field(
                "pem_key_password",
                &self.pem_key_password.as_deref().map(redact),
            )
            .field("crl_file", &self.crl_file)
            .field("auth", &self.auth)
            .field("db", &self.db)
            .field("dial_timeout", &self.dial_timeout)
            .finish()
    }
}

fn non_empty_path(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

pub(crate) fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}
