//! Session establishment
//!
//! The seam between the transport and the session layer. A [`Dialer`] opens
//! one connection to one server; [`establish_session`] walks the endpoint
//! list with it and wraps the first connection that succeeds into a
//! [`Session`] carrying the credentials for the authentication handshake.
//!
//! Each dial attempt returns a [`DialOutcome`] that bundles the address and
//! either the connection or the low-level TLS error. When every attempt
//! fails, that low-level error is kept on the [`SessionError`] so the caller
//! sees why (for example, which certificate check failed).

use crate::addr::ServerAddr;
use crate::options::redact;
use crate::tls::{TlsConnection, TlsError};
use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Message used when no server could be reached
pub const NO_REACHABLE_SERVERS: &str = "no reachable servers";

/// Credentials for the session layer's authentication handshake
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Authentication database
    pub source: String,
    pub mechanism: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("source", &self.source)
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

/// Everything needed to establish a session
#[derive(Debug, Clone)]
pub struct DialInfo {
    pub addrs: Vec<ServerAddr>,
    pub timeout: Duration,
    pub credentials: Credentials,
}

/// Result of a single dial attempt
#[derive(Debug)]
pub struct DialOutcome {
    pub addr: ServerAddr,
    pub result: Result<TlsConnection, TlsError>,
}

impl DialOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Opens connections to individual servers
pub trait Dialer {
    /// Dial one server
    fn dial_server(&self, addr: &ServerAddr) -> DialOutcome;
}

impl<D: Dialer + ?Sized> Dialer for &D {
    fn dial_server(&self, addr: &ServerAddr) -> DialOutcome {
        (**self).dial_server(addr)
    }
}

/// Session establishment error
///
/// Displays as `"<message>, openssl error: <tls error>"` when a low-level
/// diagnostic is available.
#[derive(Debug)]
pub struct SessionError {
    message: String,
    tls: Option<TlsError>,
}

impl SessionError {
    pub fn new(message: impl Into<String>, tls: Option<TlsError>) -> Self {
        SessionError {
            message: message.into(),
            tls,
        }
    }

    /// Session-layer message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Low-level TLS error from the last dial attempt
    pub fn tls(&self) -> Option<&TlsError> {
        self.tls.as_ref()
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tls {
            Some(tls) => write!(f, "{}, openssl error: {}", self.message, tls),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.tls.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// An established session: a secured connection plus its credentials
#[derive(Debug)]
pub struct Session {
    conn: TlsConnection,
    credentials: Credentials,
}

impl Session {
    pub fn addr(&self) -> &ServerAddr {
        self.conn.addr()
    }

    pub fn connection(&self) -> &TlsConnection {
        &self.conn
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Take the connection, dropping the session wrapper
    pub fn into_connection(self) -> TlsConnection {
        self.conn
    }

    pub fn close(mut self) -> io::Result<()> {
        self.conn.shutdown()
    }
}

impl Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.conn.read(buf)
    }
}

impl Write for Session {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.conn.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.conn.flush()
    }
}

/// Establish a session with the first server that accepts a connection
///
/// Servers are tried once each, in order. No retries.
pub fn establish_session<D: Dialer + ?Sized>(
    dialer: &D,
    info: &DialInfo,
) -> Result<Session, SessionError> {
    let mut last_err = None;

    for addr in &info.addrs {
        let outcome = dialer.dial_server(addr);
        match outcome.result {
            Ok(conn) => {
                tracing::info!(addr = %outcome.addr, "session established");
                return Ok(Session {
                    conn,
                    credentials: info.credentials.clone(),
                });
            }
            Err(e) => {
                tracing::debug!(addr = %outcome.addr, error = %e, "dial failed");
                last_err = Some(e);
            }
        }
    }

    Err(SessionError::new(NO_REACHABLE_SERVERS, last_err))
}
