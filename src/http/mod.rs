//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → middleware/proxy.rs (prefix check)
//!         → forwarder.rs (resolve target, relay request)
//!         → response.rs (relay status, headers, streamed body)
//!     → otherwise: host routes (/health, /admin)
//! ```

pub mod forwarder;
pub mod headers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::{resolve_target, Intercept, ProxyForwarder};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
