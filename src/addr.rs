//! Server addresses
//!
//! Turns a host list and port into the endpoints the connector dials.

use crate::{Error, Result};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// Default database server port
pub const DEFAULT_PORT: u16 = 27017;

/// Host used when none is given
pub const DEFAULT_HOST: &str = "localhost";

/// A dialable server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddr {
    host: String,
    port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ServerAddr {
            host: host.into(),
            port,
        }
    }

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`
    pub fn parse(s: &str, default_port: u16) -> Result<Self> {
        let s = s.trim();

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| Error::InvalidAddress(format!("unterminated '[' in {:?}", s)))?;
            let host = &rest[..end];
            let port = match &rest[end + 1..] {
                "" => None,
                tail => Some(tail.strip_prefix(':').ok_or_else(|| {
                    Error::InvalidAddress(format!("unexpected {:?} after ']' in {:?}", tail, s))
                })?),
            };
            (host, port)
        } else if s.matches(':').count() > 1 {
            // Bare IPv6 literal without a port
            (s, None)
        } else {
            match s.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(Error::InvalidAddress(format!("empty host in {:?}", s)));
        }

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| Error::InvalidAddress(format!("invalid port {:?} in {:?}", p, s)))?,
            None => default_port,
        };

        Ok(ServerAddr::new(host, port))
    }

    /// Host name or IP literal, without brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host parsed as an IP literal, if it is one
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    pub fn is_ip(&self) -> bool {
        self.ip().is_some()
    }

    /// Resolve to socket addresses
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        if let Some(ip) = self.ip() {
            return Ok(vec![SocketAddr::new(ip, self.port)]);
        }
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip() {
            Some(IpAddr::V6(_)) => write!(f, "[{}]:{}", self.host, self.port),
            _ => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Build the endpoint list from a host string and optional port
///
/// The host string may carry a replica set prefix (`rs0/h1,h2:27018`). An
/// explicit `port` replaces the port of every entry.
pub fn create_connection_addrs(host: &str, port: Option<u16>) -> Result<Vec<ServerAddr>> {
    let host = host.trim();
    let host = if host.is_empty() { DEFAULT_HOST } else { host };

    let hosts = match host.split_once('/') {
        Some((_set_name, hosts)) => hosts,
        None => host,
    };

    let mut addrs = Vec::new();
    for entry in hosts.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut addr = ServerAddr::parse(entry, DEFAULT_PORT)?;
        if let Some(port) = port {
            addr.port = port;
        }
        addrs.push(addr);
    }

    if addrs.is_empty() {
        return Err(Error::InvalidAddress(format!("no hosts in {:?}", host)));
    }

    Ok(addrs)
}
