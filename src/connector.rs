//! TLS connector
//!
//! A [`Connector`] is configured once from [`SecurityOptions`] and then dials
//! any number of sessions. Configuration builds the TLS context, computes the
//! endpoint list and freezes the verification strictness. Dialing only reads
//! that state, so one connector can be shared across threads.
//!
//! # Examples
//!
//! ```no_run
//! use securedial::{Connector, SecurityOptions, Strictness};
//!
//! let options = SecurityOptions::new("localhost")
//!     .ca_file("ca.pem")
//!     .crl_file("crl.pem");
//!
//! let mut connector = Connector::new();
//! connector.configure(&options).unwrap();
//! assert_eq!(connector.strictness(), Some(Strictness::Strict));
//!
//! let session = connector.dial().unwrap();
//! ```

use crate::addr::{create_connection_addrs, ServerAddr};
use crate::options::SecurityOptions;
use crate::session::{establish_session, Credentials, DialInfo, DialOutcome, Dialer, Session};
use crate::tls::{TlsConnection, TlsContext, TlsError};
use crate::{Error, Result};

/// Peer verification strictness applied at dial time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Certificate must match the dialed host name or IP address
    Strict,
    /// Host name is not checked; chain verification follows the context
    InsecureSkipHostVerification,
}

impl Strictness {
    /// Strict only with a CA file and neither relaxation flag set
    pub fn from_options(opts: &SecurityOptions) -> Self {
        if opts.allow_invalid_cert || opts.allow_invalid_hostname || opts.ca_file_path().is_none() {
            Strictness::InsecureSkipHostVerification
        } else {
            Strictness::Strict
        }
    }

    pub fn is_strict(&self) -> bool {
        *self == Strictness::Strict
    }
}

#[derive(Debug)]
struct Configured {
    ctx: TlsContext,
    strictness: Strictness,
    dial_info: DialInfo,
}

/// Connects to the database server over TLS
#[derive(Debug, Default)]
pub struct Connector {
    state: Option<Configured>,
}

impl Connector {
    /// Create an unconfigured connector
    pub fn new() -> Self {
        Connector::default()
    }

    /// Build the TLS context and endpoint list from `opts`
    ///
    /// On failure the connector is left unconfigured, discarding any earlier
    /// configuration. Note that this applies the process-wide FIPS setting.
    pub fn configure(&mut self, opts: &SecurityOptions) -> Result<()> {
        self.state = None;

        let addrs = create_connection_addrs(&opts.host, opts.port)?;
        let ctx = TlsContext::build(opts)?;
        let strictness = Strictness::from_options(opts);

        if !strictness.is_strict() {
            tracing::warn!(
                allow_invalid_cert = opts.allow_invalid_cert,
                allow_invalid_hostname = opts.allow_invalid_hostname,
                ca_file = opts.ca_file_path().is_some(),
                "server host name will not be verified"
            );
        }

        let credentials = Credentials {
            username: opts.auth.username.clone(),
            password: opts.auth.password.clone(),
            source: opts.authentication_database().to_string(),
            mechanism: opts.auth.mechanism.clone(),
        };

        tracing::debug!(
            addrs = addrs.len(),
            ?strictness,
            policy = ?ctx.policy(),
            "connector configured"
        );

        self.state = Some(Configured {
            ctx,
            strictness,
            dial_info: DialInfo {
                addrs,
                timeout: opts.dial_timeout,
                credentials,
            },
        });
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.state.is_some()
    }

    pub fn strictness(&self) -> Option<Strictness> {
        self.state.as_ref().map(|s| s.strictness)
    }

    pub fn context(&self) -> Option<&TlsContext> {
        self.state.as_ref().map(|s| &s.ctx)
    }

    pub fn addrs(&self) -> &[ServerAddr] {
        self.state
            .as_ref()
            .map(|s| s.dial_info.addrs.as_slice())
            .unwrap_or(&[])
    }

    pub fn dial_info(&self) -> Option<&DialInfo> {
        self.state.as_ref().map(|s| &s.dial_info)
    }

    /// Establish a new session
    ///
    /// Each call opens an independent connection. Blocks for at most the dial
    /// timeout per server address.
    pub fn dial(&self) -> Result<Session> {
        let state = self.state.as_ref().ok_or(Error::NotConfigured)?;
        Ok(establish_session(self, &state.dial_info)?)
    }
}

impl Dialer for Connector {
    fn dial_server(&self, addr: &ServerAddr) -> DialOutcome {
        let result = match &self.state {
            Some(state) => TlsConnection::connect(
                &state.ctx,
                addr,
                state.strictness,
                state.dial_info.timeout,
            ),
            None => Err(TlsError::NotConfigured),
        };

        DialOutcome {
            addr: addr.clone(),
            result,
        }
    }
}
