//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → rate_limited.rs (identify peer, fail closed, per-IP admission)
//!         → rate_limit.rs (token buckets, whitelist, idle eviction)
//!     → net::detect (TLS vs plaintext)
//!     → Hand off to server
//!
//! Startup:
//!     → certificates.rs (expiry, SAN coverage, chain checks)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a peer without an IP is never admitted
//! - Rejected connections are dropped before any byte is read
//! - secure_listener.rs is the only place the chain is assembled

pub mod certificates;
pub mod rate_limit;
pub mod rate_limited;
pub mod secure_listener;

pub use certificates::{
    check_certificate_expiry, check_certificate_expiry_pem, verify_certificate_address,
    verify_certificate_address_pem, verify_certificate_chain, verify_certificate_chain_pem,
    CertificateError, CertificateStatus,
};
pub use rate_limit::RateLimiter;
pub use rate_limited::{CloseHandle, RateLimitedListener};
pub use secure_listener::{new_secure_listener, SecureListener};
