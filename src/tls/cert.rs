//! Peer certificate summaries
//!
//! Enough of an X.509 certificate to explain a connection in logs and error
//! messages: who it names, who issued it, and which names it covers.

use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref};
use std::fmt;
use std::net::IpAddr;

/// Certificate information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject common name
    pub subject: String,
    /// Issuer common name
    pub issuer: String,
    /// Subject Alternative Names as `DNS:name` / `IP:addr`
    pub subject_alt_names: Vec<String>,
}

impl CertInfo {
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
        }
    }

    /// Whether the certificate is its own issuer (by common name)
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

impl fmt::Display for CertInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject={} issuer={}", self.subject, self.issuer)?;
        if !self.subject_alt_names.is_empty() {
            write!(f, " san=[{}]", self.subject_alt_names.join(", "))?;
        }
        Ok(())
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };

    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            let ip = match name.ipaddress()? {
                &[a, b, c, d] => IpAddr::from([a, b, c, d]),
                bytes => IpAddr::from(<[u8; 16]>::try_from(bytes).ok()?),
            };
            Some(format!("IP:{}", ip))
        })
        .collect()
}
