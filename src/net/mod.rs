//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection
//!     → listener.rs (Listener trait, TCP/Unix acceptors, peer identity)
//!     → [security::rate_limited admits or drops]
//!     → detect.rs (peek first byte under a deadline)
//!         → peekable.rs (buffered bytes replayed to the reader)
//!     → connection.rs (tracking for graceful shutdown)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Every wrapper implements the same Listener trait, so layers compose
//! - Detection never consumes bytes the application will read
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod detect;
pub mod listener;
pub mod peekable;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use detect::{detect_protocol, DetectError, Protocol, ProtocolDetectingListener, DETECTION_TIMEOUT};
pub use listener::{Listener, PeerAddr, TcpAcceptor};
#[cfg(unix)]
pub use listener::UnixAcceptor;
pub use peekable::PeekableStream;
