//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from configuration
//! - Provide a small leveled sink that components can be handed
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber was already installed.
pub fn init_tracing(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "secure_listener={level},tower_http={level}",
            level = config.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}

/// A leveled logging capability.
///
/// Components that need an alternate destination (tests, audit files) take
/// one of these instead of calling the tracing macros directly.
pub trait LogSink: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that forwards to the global tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use tracing::Level;

    use super::LogSink;

    /// Sink that keeps every line for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl RecordingSink {
        pub fn lines(&self) -> Vec<(Level, String)> {
            self.lines.lock().unwrap().clone()
        }

        fn push(&self, level: Level, message: &str) {
            self.lines.lock().unwrap().push((level, message.to_string()));
        }
    }

    impl LogSink for RecordingSink {
        fn debug(&self, message: &str) {
            self.push(Level::DEBUG, message);
        }

        fn info(&self, message: &str) {
            self.push(Level::INFO, message);
        }

        fn warn(&self, message: &str) {
            self.push(Level::WARN, message);
        }

        fn error(&self, message: &str) {
            self.push(Level::ERROR, message);
        }
    }
}
