//! Composition root for the admission chain.
//!
//! ```text
//! raw listener → RateLimitedListener → ProtocolDetectingListener → caller
//! ```
//!
//! Rate limiting sits closest to the socket so a throttled peer is dropped
//! before protocol detection can spend up to its timeout on it.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SecurityConfig;
use crate::net::detect::ProtocolDetectingListener;
use crate::net::listener::Listener;
use crate::net::peekable::PeekableStream;
use crate::security::rate_limit::RateLimiter;
use crate::security::rate_limited::{CloseHandle, RateLimitedListener};

/// The composed admission chain. A drop-in [`Listener`].
pub struct SecureListener<L> {
    inner: ProtocolDetectingListener<RateLimitedListener<L>>,
}

/// Wrap `listener` in the admission chain.
///
/// `None` uses the default security settings (5 connections per second,
/// burst of 10, 2 second detection timeout). Must be called from within a
/// Tokio runtime.
pub fn new_secure_listener<L: Listener>(
    listener: L,
    config: Option<&SecurityConfig>,
) -> SecureListener<L> {
    let defaults = SecurityConfig::default();
    let config = config.unwrap_or(&defaults);
    let rate_limit = config.rate_limit();

    let limiter = Arc::new(RateLimiter::from_config(&rate_limit));
    for addr in &config.whitelist {
        limiter.add_whitelist(*addr);
    }

    tracing::info!(
        max_connections_per_second = rate_limit.max_connections_per_second,
        burst = rate_limit.burst,
        whitelisted = config.whitelist.len(),
        detection_timeout_ms = config.detection_timeout_ms,
        "Secure listener initialized"
    );

    let rate_limited = RateLimitedListener::new(listener, limiter);
    SecureListener {
        inner: ProtocolDetectingListener::with_timeout(
            rate_limited,
            Duration::from_millis(config.detection_timeout_ms),
        ),
    }
}

impl<L: Listener> SecureListener<L> {
    /// Exempt `addr` from rate limiting.
    pub fn add_whitelist(&self, addr: IpAddr) {
        self.inner.get_ref().add_whitelist(addr);
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.inner.get_ref().limiter()
    }

    /// Handle that makes a pending `accept` fail and stops background work.
    pub fn close_handle(&self) -> CloseHandle {
        self.inner.get_ref().close_handle()
    }
}

impl<L: Listener> Listener for SecureListener<L> {
    type Io = PeekableStream<L::Io>;
    type Addr = L::Addr;

    async fn accept(&mut self) -> io::Result<(Self::Io, Self::Addr)> {
        self.inner.accept().await
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::net::detect::TLS_HANDSHAKE_RECORD;
    use crate::net::listener::testing::{ip, mock_listener};
    use crate::net::listener::PeerAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn defaults_apply_without_config() {
        let (raw, _connector) = mock_listener();
        let listener = new_secure_listener(raw, None);
        assert_eq!(listener.rate_limiter().burst(), 10);
        assert_eq!(listener.rate_limiter().refill_rate(), 5.0);
    }

    #[tokio::test]
    async fn whitelist_from_config_and_runtime() {
        let (raw, _connector) = mock_listener();
        let config = SecurityConfig {
            whitelist: vec!["10.1.1.1".parse().unwrap()],
            ..SecurityConfig::default()
        };
        let listener = new_secure_listener(raw, Some(&config));
        listener.add_whitelist("10.2.2.2".parse().unwrap());

        let limiter = listener.rate_limiter();
        assert!(limiter.is_whitelisted("10.1.1.1".parse().unwrap()));
        assert!(limiter.is_whitelisted("10.2.2.2".parse().unwrap()));
        assert!(!limiter.is_whitelisted("10.3.3.3".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_peer_never_reaches_detection() {
        let (raw, connector) = mock_listener();
        let config = SecurityConfig {
            rate_limit: Some(RateLimitConfig {
                max_connections_per_second: 0.001,
                burst: 1,
            }),
            ..SecurityConfig::default()
        };
        let mut listener = new_secure_listener(raw, Some(&config));

        let mut first = connector.connect(ip("198.51.100.1:1"));
        first.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        let _throttled_and_silent = connector.connect(ip("198.51.100.1:2"));
        let mut tls = connector.connect(ip("198.51.100.2:3"));
        tls.write_all(&[TLS_HANDSHAKE_RECORD, 0x03, 0x03]).await.unwrap();
        drop(tls);

        let started = tokio::time::Instant::now();
        let (_, addr) = listener.accept().await.unwrap();
        assert_eq!(addr.socket_addr().unwrap().port(), 1);

        let (mut stream, addr) = listener.accept().await.unwrap();
        assert_eq!(addr.socket_addr().unwrap().port(), 3);
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, [TLS_HANDSHAKE_RECORD, 0x03, 0x03]);

        // A silent peer that reached detection would have cost the full timeout.
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
