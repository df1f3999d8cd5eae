//! Connection admission and inspection for network servers.
//!
//! Raw listener → per-IP rate limiting → TLS/plaintext detection, exposed
//! as one [`Listener`] so a server can swap it in for its socket.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod tls;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use net::{Listener, PeerAddr, TcpAcceptor};
pub use security::{new_secure_listener, RateLimiter, SecureListener};
pub use tls::TlsAcceptor;
