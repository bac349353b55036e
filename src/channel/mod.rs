//! Real-time messaging channel.
//!
//! # Data Flow
//! ```text
//! host
//!     → registry.rs (get_client: one connection per registry)
//!     → client.rs (driver task: connect → session → reconnect loop)
//!           ├─ inbound frames → inbound.rs (append-only log → subscribers)
//!           └─ outbound queue → transport
//!     → state.rs (Disconnected/Connecting/Connected/Reconnecting/Closed)
//! ```
//!
//! # Design Decisions
//! - Frame encoding is opaque; text and binary payloads pass through as-is
//! - Reconnection is unbounded; `disconnect()` is the only terminal path
//! - Subscribers get unbounded per-subscriber queues so nothing is dropped
//!   while they are attached

pub mod client;
pub mod inbound;
pub mod registry;
pub mod state;

pub use client::ChannelHandle;
pub use inbound::{InboundLog, InboundReceiver, Payload};
pub use registry::ChannelRegistry;
pub use state::ChannelState;
