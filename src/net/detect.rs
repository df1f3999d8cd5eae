//! First-byte protocol detection.
//!
//! # Responsibilities
//! - Wrap every accepted connection in a [`PeekableStream`]
//! - Classify it as TLS or plaintext from the record type of its first byte
//! - Drop connections that disconnect before sending anything
//!
//! # Design Decisions
//! - Detection is observational: it never gates admission
//! - The first byte is peeked, never consumed, so the TLS stack downstream
//!   still sees the complete handshake record
//! - A client that stays silent past the timeout is handed over as
//!   plaintext rather than dropped

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncRead;

use crate::net::listener::Listener;
use crate::net::peekable::PeekableStream;

/// TLS record-layer content type for handshake messages.
pub const TLS_HANDSHAKE_RECORD: u8 = 0x16;

/// How long detection waits for the first byte.
pub const DETECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Classification of a connection's byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tls,
    Plain,
}

impl Protocol {
    pub fn from_first_byte(byte: u8) -> Self {
        if byte == TLS_HANDSHAKE_RECORD {
            Protocol::Tls
        } else {
            Protocol::Plain
        }
    }

    pub fn is_tls(self) -> bool {
        self == Protocol::Tls
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tls => f.write_str("TLS"),
            Protocol::Plain => f.write_str("non-TLS"),
        }
    }
}

/// Why detection could not read a first byte.
///
/// Every variant implies a non-TLS classification.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("no data within {0:?}")]
    Timeout(Duration),

    #[error("connection closed before sending data")]
    Closed,

    #[error("read failed: {0}")]
    Io(#[source] io::Error),
}

impl DetectError {
    /// Whether the peer is gone (as opposed to merely slow).
    pub fn is_disconnect(&self) -> bool {
        !matches!(self, DetectError::Timeout(_))
    }
}

/// Peek at the first byte of `stream` and classify it.
pub async fn detect_protocol<S>(
    stream: &mut PeekableStream<S>,
    timeout: Duration,
) -> Result<Protocol, DetectError>
where
    S: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, stream.peek(1)).await {
        Ok(Ok(bytes)) => Ok(Protocol::from_first_byte(bytes[0])),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(DetectError::Closed),
        Ok(Err(e)) => Err(DetectError::Io(e)),
        Err(_) => Err(DetectError::Timeout(timeout)),
    }
}

/// Listener decorator that classifies every accepted connection.
pub struct ProtocolDetectingListener<L> {
    inner: L,
    timeout: Duration,
}

impl<L: Listener> ProtocolDetectingListener<L> {
    pub fn new(inner: L) -> Self {
        Self::with_timeout(inner, DETECTION_TIMEOUT)
    }

    pub fn with_timeout(inner: L, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn get_ref(&self) -> &L {
        &self.inner
    }
}

impl<L: Listener> Listener for ProtocolDetectingListener<L> {
    type Io = PeekableStream<L::Io>;
    type Addr = L::Addr;

    async fn accept(&mut self) -> io::Result<(Self::Io, Self::Addr)> {
        loop {
            let (io, addr) = self.inner.accept().await?;
            let mut stream = PeekableStream::new(io);

            match detect_protocol(&mut stream, self.timeout).await {
                Ok(protocol) => {
                    let tag = stream.buffered().first().copied().unwrap_or_default();
                    tracing::debug!(
                        peer = ?addr,
                        %protocol,
                        tag = format_args!("{tag:#04x}"),
                        "Protocol detected"
                    );
                    return Ok((stream, addr));
                }
                Err(DetectError::Timeout(waited)) => {
                    tracing::debug!(
                        peer = ?addr,
                        ?waited,
                        "Insufficient data for protocol detection, assuming non-TLS"
                    );
                    return Ok((stream, addr));
                }
                Err(e) => {
                    tracing::warn!(peer = ?addr, error = %e, "Protocol detection failed, closing connection");
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
