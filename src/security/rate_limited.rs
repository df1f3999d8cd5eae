//! Listener decorator that enforces per-address admission.
//!
//! # Responsibilities
//! - Ask the [`RateLimiter`] about every accepted connection
//! - Close rejected connections without surfacing an error
//! - Run the periodic idle-entry sweep until the listener is closed
//!
//! # Design Decisions
//! - Fail closed: a peer without an IP identity is never admitted
//! - Only failures of the wrapped listener end the accept loop
//! - A [`CloseHandle`] lets another task stop a pending `accept`

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::net::listener::{listener_closed, Listener, PeerAddr};
use crate::security::rate_limit::RateLimiter;

/// Period of the idle-entry sweep.
pub const EVICTION_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Why a connection was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The peer address has no usable identity.
    UnknownPeer,
    /// The peer exceeded its rate.
    RateLimited(IpAddr),
}

/// Outcome of one admission check. Listener failures are reported as
/// `Err` by the accept loop and never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(Rejection),
}

/// Stops a [`RateLimitedListener`] from another task.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    /// Signal shutdown. Idempotent.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Rate-limiting listener decorator.
pub struct RateLimitedListener<L> {
    inner: L,
    limiter: Arc<RateLimiter>,
    close: CloseHandle,
    closed_rx: watch::Receiver<bool>,
    evictor: JoinHandle<()>,
}

impl<L: Listener> RateLimitedListener<L> {
    /// Wrap `inner` and start the eviction task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(inner: L, limiter: Arc<RateLimiter>) -> Self {
        let (tx, closed_rx) = watch::channel(false);
        let evictor = tokio::spawn(run_evictor(Arc::clone(&limiter), tx.subscribe()));

        Self {
            inner,
            limiter,
            close: CloseHandle { tx: Arc::new(tx) },
            closed_rx,
            evictor,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn add_whitelist(&self, addr: IpAddr) {
        self.limiter.add_whitelist(addr);
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Whether the eviction task has exited.
    pub fn evictor_finished(&self) -> bool {
        self.evictor.is_finished()
    }

    /// Admission decision for one peer.
    pub fn admit(&self, addr: &L::Addr) -> Admission {
        match addr.client_ip() {
            None => Admission::Rejected(Rejection::UnknownPeer),
            Some(ip) if self.limiter.allow(ip) => Admission::Admitted,
            Some(ip) => Admission::Rejected(Rejection::RateLimited(ip)),
        }
    }
}

impl<L: Listener> Listener for RateLimitedListener<L> {
    type Io = L::Io;
    type Addr = L::Addr;

    async fn accept(&mut self) -> io::Result<(Self::Io, Self::Addr)> {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.closed_rx.wait_for(|closed| *closed) => None,
                result = self.inner.accept() => Some(result),
            };
            let Some(accepted) = accepted else {
                self.inner.close();
                return Err(listener_closed());
            };
            let (io, addr) = accepted?;

            match self.admit(&addr) {
                Admission::Admitted => return Ok((io, addr)),
                Admission::Rejected(Rejection::UnknownPeer) => {
                    tracing::warn!(peer = ?addr, "Rejecting connection without an IP address");
                }
                Admission::Rejected(Rejection::RateLimited(ip)) => {
                    tracing::debug!(peer = %ip, "Connection rate limit exceeded");
                }
            }
            drop(io);
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }

    fn close(&mut self) {
        self.close.close();
        self.inner.close();
    }
}

impl<L> Drop for RateLimitedListener<L> {
    fn drop(&mut self) {
        self.close.close();
    }
}

async fn run_evictor(limiter: Arc<RateLimiter>, mut closed: watch::Receiver<bool>) {
    let mut ticker = time::interval_at(time::Instant::now() + EVICTION_INTERVAL, EVICTION_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.evict_idle();
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.tracked(), "Evicted idle rate limiter entries");
                }
            }
            _ = closed.wait_for(|closed| *closed) => break,
        }
    }
    tracing::debug!("Rate limiter eviction task stopped");
}
