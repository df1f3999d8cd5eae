//! Leveled logging of TLS handshake failures.
//!
//! Scanner noise is logged at debug level and everything else at warn, so
//! production logs stay readable under constant internet scanning while
//! real interoperability failures remain visible.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use crate::observability::{LogSink, TracingSink};
use crate::tls::classify::{classify_category, is_scanner_signature, TlsErrorCategory};

/// A classified handshake failure. Built to pick the log line, never stored.
#[derive(Debug, Clone)]
pub struct TlsErrorEvent {
    pub client: String,
    pub time: SystemTime,
    pub category: TlsErrorCategory,
    pub message: String,
    pub scanner: bool,
}

impl TlsErrorEvent {
    pub fn classify<E: Display + ?Sized>(peer: Option<SocketAddr>, error: &E) -> Self {
        let message = error.to_string();
        Self {
            client: peer.map_or_else(|| "unknown".to_string(), |addr| addr.to_string()),
            time: SystemTime::now(),
            category: classify_category(&message),
            scanner: is_scanner_signature(&message),
            message,
        }
    }
}

/// Logs handshake failures through a [`LogSink`].
#[derive(Clone)]
pub struct TlsErrorLogger {
    sink: Arc<dyn LogSink>,
}

impl TlsErrorLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Classify and log one failure. Returns the classification.
    pub fn log_error<E: Display + ?Sized>(&self, peer: Option<SocketAddr>, error: &E) -> TlsErrorEvent {
        let event = TlsErrorEvent::classify(peer, error);
        if event.scanner {
            self.sink.debug(&format!(
                "TLS scanner probe from {} [{}]: {}",
                event.client, event.category, event.message
            ));
        } else {
            self.sink.warn(&format!(
                "TLS handshake failed from {} [{}]: {}",
                event.client, event.category, event.message
            ));
        }
        event
    }

    /// Log the failure in `outcome`, if any.
    pub fn observe<T, E: Display>(
        &self,
        peer: Option<SocketAddr>,
        outcome: &Result<T, E>,
    ) -> Option<TlsErrorEvent> {
        outcome.as_ref().err().map(|e| self.log_error(peer, e))
    }
}

impl Default for TlsErrorLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

/// Log a handshake failure through the global tracing subscriber.
pub fn log_tls_error<E: Display + ?Sized>(peer: Option<SocketAddr>, error: &E) {
    TlsErrorLogger::default().log_error(peer, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::testing::RecordingSink;
    use tracing::Level;

    fn recording() -> (Arc<RecordingSink>, TlsErrorLogger) {
        let sink = Arc::new(RecordingSink::default());
        (sink.clone(), TlsErrorLogger::new(sink))
    }

    #[test]
    fn scanner_noise_is_debug() {
        let (sink, logger) = recording();
        let peer = "203.0.113.5:40000".parse().ok();

        let event = logger.log_error(peer, "tls: bad record MAC");
        assert!(event.scanner);
        assert_eq!(event.category, TlsErrorCategory::Record);

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Level::DEBUG);
        assert!(lines[0].1.contains("203.0.113.5:40000"));
        assert!(lines[0].1.contains("[record]"));
    }

    #[test]
    fn real_failures_are_warnings() {
        let (sink, logger) = recording();
        logger.log_error(None, "invalid peer certificate: Expired");

        let lines = sink.lines();
        assert_eq!(lines[0].0, Level::WARN);
        assert!(lines[0].1.contains("from unknown [certificate]"));
    }

    #[test]
    fn ok_outcome_logs_nothing() {
        let (sink, logger) = recording();
        let outcome: Result<(), std::io::Error> = Ok(());
        assert!(logger.observe(None, &outcome).is_none());
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn err_outcome_is_classified() {
        let (sink, logger) = recording();
        let outcome: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "peer is incompatible: NoCipherSuitesInCommon",
        ));

        let event = logger.observe("192.0.2.1:443".parse().ok(), &outcome).unwrap();
        assert_eq!(event.category, TlsErrorCategory::CipherSuite);
        assert!(event.scanner);
        assert_eq!(event.client, "192.0.2.1:443");
        assert_eq!(sink.lines().len(), 1);
    }
}
