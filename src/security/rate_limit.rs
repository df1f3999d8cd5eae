//! Per-source-address connection rate limiting.
//!
//! # Responsibilities
//! - Keep one token bucket per source address
//! - Let whitelisted addresses through without touching bucket state
//! - Forget addresses that have been idle for an hour
//!
//! # Design Decisions
//! - One mutex guards the bucket map and the whitelist together; every
//!   `allow` updates `last_seen`, so a read path would not help
//! - Whitelist entries are never removed at runtime
//! - Clock is `tokio::time::Instant` so tests can pause time

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Entries idle longer than this are evicted.
pub const IDLE_HORIZON: Duration = Duration::from_secs(60 * 60);

/// A token bucket with fixed capacity and refill rate.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_rate,
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens available as of the last refill.
    pub fn available(&self) -> f64 {
        self.tokens
    }
}

#[derive(Debug)]
struct LimiterEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

#[derive(Debug, Default)]
struct LimiterState {
    limiters: HashMap<IpAddr, LimiterEntry>,
    whitelist: HashSet<IpAddr>,
}

/// Per-address token bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    refill_rate: f64,
    burst: u32,
}

impl RateLimiter {
    /// `refill_rate` tokens per second, `burst` tokens of capacity.
    pub fn new(refill_rate: f64, burst: u32) -> Self {
        Self {
            state: Mutex::new(LimiterState::default()),
            refill_rate,
            burst,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_connections_per_second, config.burst)
    }

    /// Decide whether a new connection from `addr` is admitted.
    pub fn allow(&self, addr: IpAddr) -> bool {
        let addr = addr.to_canonical();
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        if state.whitelist.contains(&addr) {
            return true;
        }

        let (burst, refill_rate) = (self.burst, self.refill_rate);
        let entry = state.limiters.entry(addr).or_insert_with(|| LimiterEntry {
            bucket: TokenBucket::new(burst, refill_rate),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        entry.bucket.try_acquire()
    }

    /// Exempt `addr` from rate limiting.
    pub fn add_whitelist(&self, addr: IpAddr) {
        let addr = addr.to_canonical();
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        if state.whitelist.insert(addr) {
            tracing::info!(address = %addr, "Address whitelisted");
        }
    }

    pub fn is_whitelisted(&self, addr: IpAddr) -> bool {
        let state = self.state.lock().expect("rate limiter mutex poisoned");
        state.whitelist.contains(&addr.to_canonical())
    }

    /// Remove entries idle for longer than [`IDLE_HORIZON`].
    ///
    /// Returns the number of entries removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        let before = state.limiters.len();
        state
            .limiters
            .retain(|_, entry| now.duration_since(entry.last_seen) <= IDLE_HORIZON);
        before - state.limiters.len()
    }

    /// Number of addresses with bucket state.
    pub fn tracked(&self) -> usize {
        let state = self.state.lock().expect("rate limiter mutex poisoned");
        state.limiters.len()
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
