//! Relay process settings.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelaySettings (validated, immutable)
//!     → handed to lifecycle::startup
//!
//! Runtime upstream targets live in the store module, not here.
//! watcher.rs follows the store's server-side document:
//!     notify event
//!     → change channel
//!     → ConfigStore::reload()
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, ChannelSettings, ListenerConfig, LogFormat, ObservabilityConfig, ProxySettings,
    RelaySettings, StoreSettings,
};
