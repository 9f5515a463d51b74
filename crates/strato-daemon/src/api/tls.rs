//! The control plane's single TLS listener (§4.4/§10): one `rustls`
//! acceptor serves both the REST surface (bearer-token auth, no client
//! cert required) and the agent WebSocket channel (client-cert bound to
//! an enrolled agent identity). Client certificates are accepted but not
//! mandatory at the TLS layer — the distinction is enforced per-route, by
//! `ws::agent_channel` refusing an upgrade with no presented certificate.

use axum::extract::connect_info::Connected;
use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use strato_types::CertificateSerial;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::rustls::{self, RootCertStore};
use tokio_rustls::server::TlsStream;

/// Certificate serial presented by the peer on this connection, if any.
/// Populated from the validated rustls client certificate, not re-parsed
/// or re-verified here; `ws::agent_channel` still calls
/// `CertificateAuthority::validate_for_agent` before trusting it, since
/// rustls only proves the chain is valid against the trust root, not that
/// the serial is still active in our own revocation state.
#[derive(Debug, Clone, Default)]
pub struct PeerIdentity {
    pub certificate_serial: Option<CertificateSerial>,
}

fn leaf_serial(der: &rustls::pki_types::CertificateDer<'_>) -> Option<CertificateSerial> {
    let (_, cert) = x509_parser::parse_x509_certificate(der.as_ref()).ok()?;
    let serial_bytes = cert.raw_serial();
    if serial_bytes.len() > 16 {
        return None;
    }
    let mut buf = [0u8; 16];
    buf[16 - serial_bytes.len()..].copy_from_slice(serial_bytes);
    Some(CertificateSerial(u128::from_be_bytes(buf)))
}

impl<IO> Connected<&TlsStream<IO>> for PeerIdentity {
    fn connect_info(target: &TlsStream<IO>) -> Self {
        let (_, server_conn) = target.get_ref();
        let certificate_serial = server_conn
            .peer_certificates()
            .and_then(|chain| chain.first())
            .and_then(leaf_serial);
        PeerIdentity { certificate_serial }
    }
}

/// Builds the listener's `rustls::ServerConfig`: the daemon's own
/// cert/key (presented to every peer) plus a client verifier anchored at
/// the in-process Strato root CA, accepting connections that present no
/// client certificate at all (ordinary bearer-token REST clients).
pub fn build_server_config(
    cert_pem_path: &str,
    key_pem_path: &str,
    ca_trust_bundle_pem: &str,
) -> io::Result<RustlsConfig> {
    let cert_chain = load_certs(cert_pem_path)?;
    let key = load_key(key_pem_path)?;

    let mut roots = RootCertStore::empty();
    let ca_certs = rustls_pemfile::certs(&mut ca_trust_bundle_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    }

    let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
        .allow_unauthenticated()
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let mut config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}

fn load_certs(path: &str) -> io::Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file = std::fs::File::open(path)?;
    let mut reader = io::BufReader::new(file);
    rustls_pemfile::certs(&mut reader).collect()
}

fn load_key(path: &str) -> io::Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)?;
    let mut reader = io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("no private key found in {path}")))
}

/// Thin `Accept` wrapper so the daemon can hand `axum_server::bind` a
/// single acceptor type while keeping the TLS config construction (above)
/// separate from the serving loop (in `crate::server`).
#[derive(Clone)]
pub struct MtlsAcceptor {
    inner: RustlsAcceptor,
}

impl MtlsAcceptor {
    pub fn new(config: RustlsConfig) -> Self {
        Self {
            inner: RustlsAcceptor::new(config),
        }
    }
}

impl<I, S> Accept<I, S> for MtlsAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = S;
    type Future = Pin<Box<dyn Future<Output = io::Result<(Self::Stream, Self::Service)>> + Send>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { inner.accept(stream, service).await })
    }
}
