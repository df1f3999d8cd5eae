//! Handshake execution wrapper.

use std::fmt::Display;
use std::future::IntoFuture;
use std::net::SocketAddr;

use crate::tls::logger::TlsErrorLogger;

/// Runs handshakes and logs their failures.
#[derive(Clone, Default)]
pub struct HandshakeMonitor {
    logger: TlsErrorLogger,
}

impl HandshakeMonitor {
    pub fn new(logger: TlsErrorLogger) -> Self {
        Self { logger }
    }

    /// Await `handshake`, log a failure, and return its result untouched.
    pub async fn run<F, T, E>(&self, peer: Option<SocketAddr>, handshake: F) -> Result<T, E>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: Display,
    {
        let outcome = handshake.await;
        self.logger.observe(peer, &outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::testing::RecordingSink;
    use std::io;
    use std::sync::Arc;

    #[tokio::test]
    async fn success_passes_through_silently() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = HandshakeMonitor::new(TlsErrorLogger::new(sink.clone()));

        let result: Result<u32, io::Error> = monitor.run(None, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn failure_is_logged_and_returned_unchanged() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = HandshakeMonitor::new(TlsErrorLogger::new(sink.clone()));

        let result: Result<(), io::Error> = monitor
            .run("198.51.100.4:1234".parse().ok(), async {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "received fatal alert: HandshakeFailure"))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(err.to_string(), "received fatal alert: HandshakeFailure");
        assert_eq!(sink.lines().len(), 1);
    }
}
