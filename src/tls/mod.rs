//! TLS support for database connections
//!
//! This module owns everything OpenSSL-specific: building the client context,
//! the process-wide FIPS switch, and running the client handshake.
//!
//! # Context construction
//!
//! [`TlsContext::build`] applies, in order:
//!
//! 1. FIPS mode (process-wide)
//! 2. A new context negotiating any protocol version
//! 3. All bug workarounds, SSLv2 disabled
//! 4. The [`CIPHER_LIST`] cipher policy
//! 5. Client certificate chain and private key (optional)
//! 6. Auto-retry on renegotiation
//! 7. Session caching and tickets disabled
//! 8. Trust anchors and client CA names from the CA file (optional)
//! 9. CRL revocation checking (optional)
//!
//! # Examples
//!
//! ```no_run
//! use securedial::tls::{TlsConnection, TlsContext};
//! use securedial::{SecurityOptions, ServerAddr, Strictness};
//! use std::time::Duration;
//!
//! let options = SecurityOptions::new("db.example.com").ca_file("ca.pem");
//! let ctx = TlsContext::build(&options).unwrap();
//!
//! let addr = ServerAddr::new("db.example.com", 27017);
//! let conn = TlsConnection::connect(&ctx, &addr, Strictness::Strict, Duration::from_secs(3)).unwrap();
//! println!("{} {}", conn.version(), conn.cipher());
//! ```

pub mod cert;
pub mod context;
pub mod error;
pub mod fips;
pub mod stream;

pub use cert::CertInfo;
pub use context::{ContextPolicy, TlsContext, CIPHER_LIST};
pub use error::TlsError;
pub use fips::{ensure_fips_mode, fips_mode};
pub use stream::TlsConnection;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
