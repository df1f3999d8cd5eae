//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, leveled sinks)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Leveled logs are the only side channel of the admission layer

pub mod logging;

pub use logging::{init_tracing, LogSink, TracingSink};
