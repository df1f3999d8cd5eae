//! Listener contract and raw socket listeners.
//!
//! # Responsibilities
//! - Define the accept/close/local-address contract every layer implements
//! - Bind to configured address(es)
//! - Expose the peer identity used for admission decisions
//!
//! # Design Decisions
//! - Decorators implement the same trait as raw sockets, so a composed
//!   chain is a drop-in replacement for the socket it wraps
//! - `accept` errors are listener-fatal; per-connection failures never
//!   surface through it
//! - Closing a connection is dropping its stream

use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Peer address of an accepted connection.
pub trait PeerAddr: Debug + Clone + Send + Sync + 'static {
    /// The peer's socket address, if it has an IP address family.
    fn socket_addr(&self) -> Option<SocketAddr>;

    /// The identity used for per-source admission, if one can be derived.
    ///
    /// IPv4 peers on a dual-stack socket arrive as `::ffff:a.b.c.d`; they
    /// are reported in their plain IPv4 form.
    fn client_ip(&self) -> Option<IpAddr> {
        self.socket_addr().map(|addr| addr.ip().to_canonical())
    }
}

impl PeerAddr for SocketAddr {
    fn socket_addr(&self) -> Option<SocketAddr> {
        Some(*self)
    }
}

#[cfg(unix)]
impl PeerAddr for tokio::net::unix::SocketAddr {
    fn socket_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// A source of accepted connections.
pub trait Listener: Send + 'static {
    /// The connection stream type.
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// The peer/local address type.
    type Addr: PeerAddr;

    /// Accept the next connection.
    ///
    /// An error means the listener itself failed (for example it was
    /// closed); callers should stop accepting.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, Self::Addr)>> + Send;

    /// The local address this listener is bound to.
    fn local_addr(&self) -> io::Result<Self::Addr>;

    /// Stop listening. Later calls to `accept` fail.
    fn close(&mut self);
}

pub(crate) fn listener_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Raw TCP listener.
#[derive(Debug)]
pub struct TcpAcceptor {
    inner: Option<TcpListener>,
}

impl TcpAcceptor {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> io::Result<Self> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let acceptor = Self::from_std_addr(addr).await?;
        tracing::info!(address = %acceptor.local_addr()?, "Listener bound");
        Ok(acceptor)
    }

    /// Bind directly to a socket address.
    pub async fn from_std_addr(addr: SocketAddr) -> io::Result<Self> {
        Ok(Self::from_listener(TcpListener::bind(addr).await?))
    }

    /// Wrap an already bound Tokio listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            inner: Some(listener),
        }
    }
}

impl Listener for TcpAcceptor {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        let listener = self.inner.as_ref().ok_or_else(listener_closed)?;
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tracing::trace!(peer = %addr, "Connection accepted");
                    return Ok((stream, addr));
                }
                // The peer went away between SYN and accept; not a listener failure.
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "Accept aborted by peer");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner
            .as_ref()
            .ok_or_else(listener_closed)?
            .local_addr()
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

/// Raw Unix-domain listener. Its peers carry no IP identity.
#[cfg(unix)]
#[derive(Debug)]
pub struct UnixAcceptor {
    inner: Option<tokio::net::UnixListener>,
}

#[cfg(unix)]
impl UnixAcceptor {
    /// Bind to a filesystem path.
    pub fn bind(path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        Ok(Self {
            inner: Some(tokio::net::UnixListener::bind(path)?),
        })
    }
}

#[cfg(unix)]
impl Listener for UnixAcceptor {
    type Io = tokio::net::UnixStream;
    type Addr = tokio::net::unix::SocketAddr;

    async fn accept(&mut self) -> io::Result<(Self::Io, Self::Addr)> {
        let listener = self.inner.as_ref().ok_or_else(listener_closed)?;
        listener.accept().await
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner
            .as_ref()
            .ok_or_else(listener_closed)?
            .local_addr()
    }

    fn close(&mut self) {
        self.inner = None;
    }
}
