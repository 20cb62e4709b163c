//! securedial - TLS connector for database client tools
//!
//! This crate builds a single, immutable OpenSSL client context from a set of
//! security options and uses it to open verified (or deliberately relaxed)
//! TLS connections to a database server. The connection is handed to a
//! session layer that owns the wire protocol and authentication.
//!
//! # Architecture
//!
//! - [`tls::TlsContext`] is built once from [`SecurityOptions`]: certificate
//!   chain and key, trust store, cipher policy, revocation checking
//! - [`Connector`] holds the context, the endpoint list and the verification
//!   strictness; it implements [`Dialer`] for the session layer
//! - [`establish_session`] walks the endpoint list and returns the first
//!   established [`Session`]
//!
//! # Timeouts
//!
//! The dial timeout ([`SecurityOptions::dial_timeout()`], 3 seconds by default)
//! bounds each TCP connect and each handshake read or write for one server
//! address. It is not a deadline for the whole [`Connector::dial`]: with a
//! host list of N unreachable servers a dial can block for roughly N times
//! the timeout, since servers are tried one after another.
//!
//! # Examples
//!
//! ```no_run
//! use securedial::{Connector, SecurityOptions};
//!
//! let options = SecurityOptions::new("db1.example.com,db2.example.com")
//!     .port(27017)
//!     .ca_file("/etc/ssl/ca.pem")
//!     .pem_key_file("/etc/ssl/client.pem");
//!
//! let mut connector = Connector::new();
//! connector.configure(&options).unwrap();
//!
//! let session = connector.dial().unwrap();
//! println!("connected to {} using {}", session.addr(), session.connection().cipher());
//! ```

pub mod addr;
pub mod connector;
pub mod options;
pub mod session;
pub mod tls;

pub use addr::{create_connection_addrs, ServerAddr, DEFAULT_PORT};
pub use connector::{Connector, Strictness};
pub use options::{AuthOptions, SecurityOptions, DEFAULT_DIAL_TIMEOUT};
pub use session::{establish_session, Credentials, DialInfo, DialOutcome, Dialer, Session, SessionError};

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Connector errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tls context setup: {0}")]
    Context(#[from] tls::TlsError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("connector is not configured")]
    NotConfigured,

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl Error {
    /// Whether this error was caused by a dial timing out
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Session(e) => e.tls().is_some_and(tls::TlsError::is_timeout),
            Error::Context(e) => e.is_timeout(),
            _ => false,
        }
    }
}
