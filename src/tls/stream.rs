//! Established TLS connections
//!
//! [`TlsConnection::connect`] performs the blocking TCP connect and TLS
//! handshake for a single server address, bounded by the dial timeout.

use super::cert::CertInfo;
use super::context::TlsContext;
use super::error::TlsError;
use crate::addr::ServerAddr;
use crate::connector::Strictness;
use openssl::ssl::{HandshakeError, Ssl, SslStream};
use openssl::x509::verify::X509CheckFlags;
use openssl::x509::X509VerifyResult;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// A TLS-secured connection to one server
pub struct TlsConnection {
    stream: SslStream<TcpStream>,
    addr: ServerAddr,
}

impl TlsConnection {
    /// Connect to `addr` and run the client handshake
    ///
    /// Chain verification follows the context's verify mode. With
    /// [`Strictness::Strict`] the certificate must also match the host name
    /// (or IP address) being dialed.
    pub fn connect(
        ctx: &TlsContext,
        addr: &ServerAddr,
        strictness: Strictness,
        timeout: Duration,
    ) -> Result<Self, TlsError> {
        let tcp = connect_tcp(addr, timeout)?;
        set_timeouts(&tcp, Some(timeout), addr)?;

        let handshake_err = |reason: String| TlsError::Handshake {
            addr: addr.to_string(),
            reason,
        };

        let mut ssl = Ssl::new(ctx.ssl_context()).map_err(|e| handshake_err(e.to_string()))?;

        // SNI is for names only
        if !addr.is_ip() {
            ssl.set_hostname(addr.host())
                .map_err(|e| handshake_err(e.to_string()))?;
        }

        if strictness == Strictness::Strict {
            let param = ssl.param_mut();
            param.set_hostflags(X509CheckFlags::NO_PARTIAL_WILDCARDS);
            let expected = match addr.ip() {
                Some(ip) => param.set_ip(ip),
                None => param.set_host(addr.host()),
            };
            expected.map_err(|e| handshake_err(e.to_string()))?;
        }

        let stream = match ssl.connect(tcp) {
            Ok(stream) => stream,
            Err(HandshakeError::WouldBlock(_)) => {
                return Err(TlsError::Timeout {
                    addr: addr.to_string(),
                    timeout,
                });
            }
            Err(HandshakeError::Failure(mid)) => {
                if mid.error().io_error().is_some_and(is_timeout) {
                    return Err(TlsError::Timeout {
                        addr: addr.to_string(),
                        timeout,
                    });
                }
                let mut reason = mid.error().to_string();
                let verify = mid.ssl().verify_result();
                if verify != X509VerifyResult::OK {
                    reason = format!("{}: certificate verify failed: {}", reason, verify);
                }
                return Err(handshake_err(reason));
            }
            Err(HandshakeError::SetupFailure(e)) => return Err(handshake_err(e.to_string())),
        };

        set_timeouts(stream.get_ref(), None, addr)?;

        let conn = TlsConnection {
            stream,
            addr: addr.clone(),
        };
        tracing::debug!(
            addr = %conn.addr,
            version = conn.version(),
            cipher = conn.cipher(),
            "TLS handshake complete"
        );
        Ok(conn)
    }

    /// Server address this connection was dialed to
    pub fn addr(&self) -> &ServerAddr {
        &self.addr
    }

    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Negotiated cipher suite
    pub fn cipher(&self) -> &'static str {
        self.stream
            .ssl()
            .current_cipher()
            .map(|c| c.name())
            .unwrap_or("<undef>")
    }

    /// Summary of the server's leaf certificate
    pub fn peer_certificate(&self) -> Option<CertInfo> {
        self.stream
            .ssl()
            .peer_certificate()
            .map(|cert| CertInfo::from_x509(&cert))
    }

    /// Chain verification result as seen by OpenSSL
    pub fn verify_result(&self) -> X509VerifyResult {
        self.stream.ssl().verify_result()
    }

    /// Whether the session was resumed from a cache (never, with this context)
    pub fn session_reused(&self) -> bool {
        self.stream.ssl().session_reused()
    }

    /// Underlying TCP socket
    ///
    /// Reading or writing it directly corrupts the TLS stream.
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Send close_notify and shut the socket down
    pub fn shutdown(&mut self) -> io::Result<()> {
        // Best effort; the peer may already be gone
        let _ = self.stream.shutdown();
        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            result => result,
        }
    }
}

impl Read for TlsConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TlsConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnection")
            .field("addr", &self.addr)
            .field("version", &self.version())
            .field("cipher", &self.cipher())
            .finish()
    }
}

/// Open a TCP connection to the first reachable resolved address
fn connect_tcp(addr: &ServerAddr, timeout: Duration) -> Result<TcpStream, TlsError> {
    let targets = addr.socket_addrs().map_err(|source| TlsError::Resolve {
        addr: addr.to_string(),
        source,
    })?;

    let mut last_err = None;
    for target in targets {
        tracing::debug!(%addr, %target, ?timeout, "connecting");
        match connect_socket(target, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) if is_timeout(&e) => TlsError::Timeout {
            addr: addr.to_string(),
            timeout,
        },
        Some(source) => TlsError::Connect {
            addr: addr.to_string(),
            source,
        },
        None => TlsError::Resolve {
            addr: addr.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        },
    })
}

fn connect_socket(target: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(target), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect_timeout(&SockAddr::from(target), timeout)?;
    socket.set_nodelay(true)?;
    Ok(socket.into())
}

fn set_timeouts(
    tcp: &TcpStream,
    timeout: Option<Duration>,
    addr: &ServerAddr,
) -> Result<(), TlsError> {
    tcp.set_read_timeout(timeout)
        .and_then(|()| tcp.set_write_timeout(timeout))
        .map_err(|source| TlsError::Connect {
            addr: addr.to_string(),
            source,
        })
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
