//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → matcher.rs (proxy prefix check)
//!     → Return: remainder to forward, or no match (normal routing)
//! ```
//!
//! # Design Decisions
//! - One prefix, fixed at startup
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always gives the same decision

pub mod matcher;

pub use matcher::{Matcher, ProxyPrefix};
