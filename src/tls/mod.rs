//! TLS subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted connection (first byte already classified)
//!     → acceptor.rs (rustls server handshake)
//!     → monitor.rs (await handshake, never alter its result)
//!     → On failure: classify.rs (category + scanner signature)
//!     → logger.rs (debug for scanner noise, warn otherwise)
//! ```
//!
//! # Design Decisions
//! - Handshake errors are logged here and returned to the caller as-is
//! - No retries and no suppression at this layer
//! - Classification picks log severity only; it never gates admission

pub mod acceptor;
pub mod classify;
pub mod logger;
pub mod monitor;

pub use acceptor::{TlsAcceptor, TlsSetupError};
pub use classify::{classify_category, is_scanner_signature, TlsErrorCategory};
pub use logger::{log_tls_error, TlsErrorEvent, TlsErrorLogger};
pub use monitor::HandshakeMonitor;
