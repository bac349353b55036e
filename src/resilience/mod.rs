//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Channel transport lost:
//!     → backoff.rs (next delay: 1s, 2s, 4s, 5s, 5s, ...)
//!     → sleep, then handshake under connect_timeout
//!     → success resets the sequence
//! ```
//!
//! # Design Decisions
//! - Reconnection never gives up on its own; only an explicit close stops it
//! - Delays are deterministic (no jitter) so they never shrink between attempts
//! - Proxied HTTP requests are never retried

pub mod backoff;

pub use backoff::{calculate_backoff, Backoff, ReconnectPolicy};
