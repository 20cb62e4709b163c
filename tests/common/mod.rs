//! Shared fixtures: a throwaway PKI and a blocking TLS test server

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod, SslVerifyMode};
use openssl::symm::Cipher;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509NameBuilder, X509};
use std::fs;
use std::io::Write;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

pub const KEY_PASSWORD: &str = "correct horse";

/// Pre-generated revocation fixtures; see `tests/fixtures/crl/generate.sh`
pub struct RevocationFixtures {
    /// Issuing CA
    pub ca_file: PathBuf,
    /// Server leaf that is not revoked
    pub good_server_pem: PathBuf,
    /// Server leaf listed in [`Self::crl_file`]
    pub revoked_server_pem: PathBuf,
    /// CRL revoking [`Self::revoked_server_pem`]
    pub crl_file: PathBuf,
    /// CRL with no entries
    pub empty_crl_file: PathBuf,
}

impl RevocationFixtures {
    pub fn load() -> Self {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/crl");
        RevocationFixtures {
            ca_file: dir.join("ca.pem"),
            good_server_pem: dir.join("good-server.pem"),
            revoked_server_pem: dir.join("revoked-server.pem"),
            crl_file: dir.join("crl.pem"),
            empty_crl_file: dir.join("empty-crl.pem"),
        }
    }
}

/// A certificate together with its private key
pub struct Issued {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl Issued {
    fn pem(&self) -> Vec<u8> {
        let mut pem = self.cert.to_pem().unwrap();
        pem.extend(self.key.private_key_to_pem_pkcs8().unwrap());
        pem
    }

    fn encrypted_pem(&self, password: &str) -> Vec<u8> {
        let mut pem = self.cert.to_pem().unwrap();
        pem.extend(
            self.key
                .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), password.as_bytes())
                .unwrap(),
        );
        pem
    }
}

/// Certificates and keys written to a temporary directory
pub struct Pki {
    pub dir: TempDir,
    /// Trusted CA certificate
    pub ca_file: PathBuf,
    /// Untrusted CA certificate
    pub other_ca_file: PathBuf,
    /// Both CA certificates
    pub ca_bundle: PathBuf,
    /// Server for 127.0.0.1 / localhost, issued by the trusted CA
    pub server_pem: PathBuf,
    /// Server for 127.0.0.1 / localhost, issued by the untrusted CA
    pub untrusted_server_pem: PathBuf,
    /// Server for other.example only, issued by the trusted CA
    pub wrong_host_server_pem: PathBuf,
    /// Client certificate and unencrypted key
    pub client_pem: PathBuf,
    /// Client certificate and key encrypted with [`KEY_PASSWORD`]
    pub client_encrypted_pem: PathBuf,
    /// Client certificate followed by somebody else's key
    pub mismatched_pem: PathBuf,
}

impl Pki {
    pub fn generate() -> Self {
        let dir = TempDir::new().unwrap();

        let ca = issue_ca("securedial test CA");
        let other_ca = issue_ca("untrusted test CA");
        let local = ["localhost"];
        let server = issue_leaf(&ca, "server", &local, &["127.0.0.1", "::1"]);
        let untrusted_server = issue_leaf(&other_ca, "server", &local, &["127.0.0.1"]);
        let wrong_host_server = issue_leaf(&ca, "other.example", &["other.example"], &[]);
        let client = issue_leaf(&ca, "client", &[], &[]);
        let stranger = issue_leaf(&ca, "stranger", &[], &[]);

        let mut mismatched = client.cert.to_pem().unwrap();
        mismatched.extend(stranger.key.private_key_to_pem_pkcs8().unwrap());

        let mut bundle = ca.cert.to_pem().unwrap();
        bundle.extend(other_ca.cert.to_pem().unwrap());

        Pki {
            ca_file: write(dir.path(), "ca.pem", &ca.cert.to_pem().unwrap()),
            other_ca_file: write(dir.path(), "other-ca.pem", &other_ca.cert.to_pem().unwrap()),
            ca_bundle: write(dir.path(), "ca-bundle.pem", &bundle),
            server_pem: write(dir.path(), "server.pem", &server.pem()),
            untrusted_server_pem: write(dir.path(), "untrusted-server.pem", &untrusted_server.pem()),
            wrong_host_server_pem: write(dir.path(), "wrong-host.pem", &wrong_host_server.pem()),
            client_pem: write(dir.path(), "client.pem", &client.pem()),
            client_encrypted_pem: write(
                dir.path(),
                "client-encrypted.pem",
                &client.encrypted_pem(KEY_PASSWORD),
            ),
            mismatched_pem: write(dir.path(), "mismatched.pem", &mismatched),
            dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        write(self.dir.path(), name, contents)
    }
}

fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::File::create(&path).unwrap().write_all(contents).unwrap();
    path
}

fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn serial() -> openssl::asn1::Asn1Integer {
    let mut bn = BigNum::new().unwrap();
    bn.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    bn.to_asn1_integer().unwrap()
}

fn issue_ca(cn: &str) -> Issued {
    let key = new_key();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    Issued {
        cert: builder.build(),
        key,
    }
}

fn issue_leaf(ca: &Issued, cn: &str, dns: &[&str], ips: &[&str]) -> Issued {
    let key = new_key();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, cn).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_serial_number(&serial()).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(ca.cert.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_agreement()
                .build()
                .unwrap(),
        )
        .unwrap();
    builder
        .append_extension(
            ExtendedKeyUsage::new()
                .server_auth()
                .client_auth()
                .build()
                .unwrap(),
        )
        .unwrap();

    if !dns.is_empty() || !ips.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for name in dns {
            san.dns(name);
        }
        for ip in ips {
            san.ip(ip);
        }
        let san = san
            .build(&builder.x509v3_context(Some(&*ca.cert), None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }

    builder.sign(&ca.key, MessageDigest::sha256()).unwrap();

    Issued {
        cert: builder.build(),
        key,
    }
}

/// Test server options
#[derive(Default)]
pub struct ServerConfig {
    /// CA used to require and verify client certificates
    pub require_client_cert: Option<PathBuf>,
}

/// Spawn a TLS server on 127.0.0.1 that greets every client with `hello`
///
/// Handshake failures are ignored; the server keeps accepting until the test
/// process exits.
pub fn spawn_server(pem: &Path, config: ServerConfig) -> u16 {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_certificate_chain_file(pem).unwrap();
    acceptor.set_private_key_file(pem, SslFiletype::PEM).unwrap();
    if let Some(ca) = &config.require_client_cert {
        acceptor.set_ca_file(ca).unwrap();
        acceptor.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
    }
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let acceptor = acceptor.clone();
            thread::spawn(move || {
                if let Ok(mut tls) = acceptor.accept(stream) {
                    let _ = tls.write_all(b"hello");
                    let _ = tls.shutdown();
                }
            });
        }
    });

    port
}
