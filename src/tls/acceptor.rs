//! TLS configuration, certificate loading, and monitored handshakes.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;

use crate::tls::monitor::HandshakeMonitor;

/// Errors raised while building a TLS server configuration.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("no certificates found in PEM input")]
    NoCertificates,

    #[error("no private key found in PEM input")]
    NoPrivateKey,

    #[error("invalid PEM input: {0}")]
    Pem(#[source] io::Error),

    #[error("invalid TLS configuration: {0}")]
    Config(#[from] rustls::Error),
}

/// Parse every certificate in a PEM buffer.
pub fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsSetupError::Pem)?;
    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates);
    }
    Ok(certs)
}

/// Parse the first private key in a PEM buffer.
pub fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(TlsSetupError::Pem)?
        .ok_or(TlsSetupError::NoPrivateKey)
}

/// Build a rustls server configuration, checking that the key matches.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, TlsSetupError> {
    let provider = rustls::crypto::ring::default_provider();
    let mut config = ServerConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, TlsSetupError> {
    std::fs::read(path).map_err(|source| TlsSetupError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Server-side TLS acceptor whose handshakes are monitored.
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: tokio_rustls::TlsAcceptor,
    monitor: HandshakeMonitor,
}

impl TlsAcceptor {
    pub fn new(config: ServerConfig, monitor: HandshakeMonitor) -> Self {
        Self {
            inner: tokio_rustls::TlsAcceptor::from(Arc::new(config)),
            monitor,
        }
    }

    /// Build from PEM buffers.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsSetupError> {
        let config = server_config(parse_certificates(cert_pem)?, parse_private_key(key_pem)?)?;
        Ok(Self::new(config, HandshakeMonitor::default()))
    }

    /// Load certificate and key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TlsSetupError> {
        let acceptor = Self::from_pem(&read_file(cert_path)?, &read_file(key_path)?)?;
        tracing::info!(cert = %cert_path.display(), "TLS certificate loaded");
        Ok(acceptor)
    }

    /// Replace the handshake monitor.
    pub fn with_monitor(mut self, monitor: HandshakeMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Run the server handshake on `stream`. Failures are logged and
    /// returned unchanged.
    pub async fn accept<S>(&self, stream: S, peer: Option<SocketAddr>) -> io::Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.monitor.run(peer, self.inner.accept(stream)).await
    }
}
