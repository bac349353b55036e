//! Settings schema definitions.
//!
//! This module defines the relay process's own settings file. All types
//! derive Serde traits for deserialization from TOML, and every field has a
//! default so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::ReconnectPolicy;
use crate::store::HostContext;

/// Root settings for the relay process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelaySettings {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Proxy interception settings.
    pub proxy: ProxySettings,

    /// Configuration store persistence.
    pub store: StoreSettings,

    /// Messaging channel client.
    pub channel: ChannelSettings,

    /// Management API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5173").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5173".to_string(),
        }
    }
}

/// Request interception settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Path prefix that marks a request for forwarding.
    pub prefix: String,

    /// Drop connection-scoped headers (host, connection, ...) on both legs.
    pub strip_connection_headers: bool,

    /// Optional ceiling on a whole upstream exchange, in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            prefix: "/api/proxy".to_string(),
            strip_connection_headers: true,
            request_timeout_secs: None,
        }
    }
}

impl ProxySettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Where and how the configuration store persists.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Host context, which selects the persistence backend.
    pub host: HostContext,

    /// JSON document used on server hosts.
    pub config_path: PathBuf,

    /// Local storage document used on client hosts.
    pub local_storage_path: PathBuf,

    /// Key of the configuration entry inside local storage.
    pub storage_key: String,

    /// Reload when the server-side document is edited externally.
    pub watch: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: HostContext::Server,
            config_path: PathBuf::from("config.json"),
            local_storage_path: PathBuf::from("local_storage.json"),
            storage_key: "backendConfig".to_string(),
            watch: true,
        }
    }
}

/// Messaging channel settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Connect to the configured websocket endpoint at startup.
    pub enabled: bool,

    /// First reconnection delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Ceiling for the reconnection delay in milliseconds.
    pub max_delay_ms: u64,

    /// Handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            enabled: false,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            connect_timeout_ms: policy.connect_timeout.as_millis() as u64,
        }
    }
}

impl ChannelSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the /admin routes.
    pub enabled: bool,

    /// Bearer token required by the /admin routes, if set.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
