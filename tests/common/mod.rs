//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use secure_listener::config::{RateLimitConfig, SecurityConfig};
use secure_listener::net::Listener;
use secure_listener::{new_secure_listener, SecureListener, TcpAcceptor};

/// Long enough for a loopback connection to reach the listener.
pub const SETTLE: Duration = Duration::from_millis(300);

/// Bind a secure listener on an ephemeral loopback port.
pub async fn bind_secure(config: Option<SecurityConfig>) -> (SecureListener<TcpAcceptor>, SocketAddr) {
    let acceptor = TcpAcceptor::from_std_addr("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = acceptor.local_addr().unwrap();
    (new_secure_listener(acceptor, config.as_ref()), addr)
}

pub fn security(rate: f64, burst: u32) -> SecurityConfig {
    SecurityConfig {
        rate_limit: Some(RateLimitConfig {
            max_connections_per_second: rate,
            burst,
        }),
        ..SecurityConfig::default()
    }
}

/// Self-signed certificate for `localhost` and `127.0.0.1`, as (cert, key) PEM.
pub fn self_signed() -> (String, String) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
        .unwrap();
    (cert.cert.pem(), cert.key_pair.serialize_pem())
}

/// Client configuration trusting exactly `cert_pem`.
pub fn client_config(cert_pem: &str) -> Arc<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut cert_pem.as_bytes()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Arc::new(config)
}

pub async fn tls_connect(
    addr: SocketAddr,
    cert_pem: &str,
) -> std::io::Result<tokio_rustls::client::TlsStream<tokio::net::TcpStream>> {
    let tcp = tokio::net::TcpStream::connect(addr).await?;
    let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
    tokio_rustls::TlsConnector::from(client_config(cert_pem))
        .connect(name, tcp)
        .await
}
