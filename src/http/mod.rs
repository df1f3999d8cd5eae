//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Secure listener (admitted, protocol logged)
//!     → server.rs (optional TLS handshake via tls::TlsAcceptor)
//!     → hyper-util auto builder (HTTP/1.1 or HTTP/2)
//!     → axum Router (trace + timeout layers)
//!     → Send to client
//! ```

pub mod server;

pub use server::{HttpServer, ServerError};
