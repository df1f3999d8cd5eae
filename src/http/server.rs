//! HTTP server driven by any [`Listener`].
//!
//! # Responsibilities
//! - Accept from the (secure) listener until shutdown or a listener failure
//! - Run the optional TLS handshake through the monitored acceptor
//! - Serve HTTP/1.1 and HTTP/2 with an axum Router
//! - Wire up middleware (tracing, request timeout)
//! - Drain in-flight connections on shutdown

use std::io;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::config::TimeoutConfig;
use crate::net::{ConnectionTracker, Listener, PeerAddr};
use crate::tls::TlsAcceptor;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("listener failed: {0}")]
    Accept(#[source] io::Error),
}

/// HTTP server over a [`Listener`] chain.
pub struct HttpServer {
    router: Router,
    tls: Option<TlsAcceptor>,
    timeouts: TimeoutConfig,
    tracker: ConnectionTracker,
    draining: watch::Sender<bool>,
}

impl HttpServer {
    pub fn new(router: Router, tls: Option<TlsAcceptor>, timeouts: TimeoutConfig) -> Self {
        let router = Self::apply_layers(router, &timeouts);
        let (draining, _) = watch::channel(false);
        Self {
            router,
            tls,
            timeouts,
            tracker: ConnectionTracker::new(),
            draining,
        }
    }

    #[allow(deprecated)]
    fn apply_layers(router: Router, timeouts: &TimeoutConfig) -> Router {
        router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs))),
        )
    }

    /// Tracker for connections handed out by this server.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept and serve until `shutdown` fires or the listener fails.
    ///
    /// In both cases the listener is closed and in-flight connections get
    /// `shutdown_grace_secs` to finish. A listener failure is returned.
    pub async fn run<L: Listener>(
        self,
        mut listener: L,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = ?addr, tls = self.tls.is_some(), "HTTP server starting");
        }

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((io, addr)) => self.spawn_connection(io, addr),
                    Err(e) => {
                        tracing::error!(error = %e, "Listener failed");
                        break Err(ServerError::Accept(e));
                    }
                },
            }
        };

        listener.close();
        self.draining.send_replace(true);

        let grace = Duration::from_secs(self.timeouts.shutdown_grace_secs);
        if !self.tracker.wait_for_drain(grace).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        result
    }

    fn spawn_connection<I, A>(&self, io: I, addr: A)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        A: PeerAddr,
    {
        let guard = self.tracker.track();
        let span = tracing::debug_span!("connection", id = %guard.id(), peer = ?addr);
        let router = self.router.clone();
        let tls = self.tls.clone();
        let handshake_timeout = Duration::from_secs(self.timeouts.request_secs);
        let draining = self.draining.subscribe();

        tokio::spawn(
            async move {
                let _guard = guard;
                match tls {
                    Some(tls) => {
                        let handshake = tls.accept(io, addr.socket_addr());
                        match tokio::time::timeout(handshake_timeout, handshake).await {
                            Ok(Ok(stream)) => serve_connection(stream, router, draining).await,
                            // The handshake monitor already logged the failure.
                            Ok(Err(_)) => {}
                            Err(_) => tracing::debug!("TLS handshake timed out"),
                        }
                    }
                    None => serve_connection(io, router, draining).await,
                }
            }
            .instrument(span),
        );
    }
}

async fn serve_connection<I>(io: I, router: Router, mut draining: watch::Receiver<bool>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(io), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = async { let _ = draining.wait_for(|d| *d).await; } => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Connection ended with error");
    }
}
