//! Edge relay library: a configuration-driven HTTP forwarding proxy and a
//! resilient websocket channel client sharing one configuration store.

pub mod error;
pub mod store;

// Traffic
pub mod http;
pub mod routing;
pub mod channel;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use channel::{ChannelHandle, ChannelRegistry, ChannelState};
pub use config::RelaySettings;
pub use error::{ErrorKind, RelayError, RelayResult};
pub use http::{HttpServer, ProxyForwarder};
pub use lifecycle::Shutdown;
pub use store::{ConfigStore, Configuration};
