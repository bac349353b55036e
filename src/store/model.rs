//! The persisted configuration record.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RelayError, RelayResult};

/// Default upstream API base.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
/// Default messaging endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "http://localhost:3000";
/// Default media file server.
pub const DEFAULT_FILE_SERVER_URL: &str = "http://localhost:5173/videos/";

/// Upstream targets shared by the forwarder and the channel client.
///
/// Serialized as a flat JSON object. Fields other than the three URLs are
/// carried through `extra` untouched so that a save never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub api_base_url: String,

    pub websocket_url: String,

    /// Older documents call this `fileServer`.
    #[serde(alias = "fileServer")]
    pub file_server_url: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            file_server_url: DEFAULT_FILE_SERVER_URL.to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Configuration {
    /// Check that every URL field is an absolute, hierarchical URI.
    pub fn validate(&self) -> RelayResult<()> {
        parse_absolute("apiBaseUrl", &self.api_base_url)?;
        parse_absolute("websocketUrl", &self.websocket_url)?;
        parse_absolute("fileServerUrl", &self.file_server_url)?;
        Ok(())
    }

    /// Parsed upstream base for the forwarder.
    pub fn api_base(&self) -> RelayResult<Url> {
        parse_absolute("apiBaseUrl", &self.api_base_url)
    }

    /// Endpoint the channel client should dial.
    ///
    /// `http`/`https` values are rewritten to `ws`/`wss`.
    pub fn websocket_endpoint(&self) -> String {
        websocket_endpoint(&self.websocket_url)
    }
}

/// Map an HTTP-style endpoint onto its websocket scheme.
pub fn websocket_endpoint(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return url.into(),
    };
    if url.set_scheme(scheme).is_err() {
        return raw.to_string();
    }
    url.into()
}

fn parse_absolute(field: &'static str, value: &str) -> RelayResult<Url> {
    let url = Url::parse(value).map_err(|e| RelayError::InvalidConfig {
        field,
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !url.has_host() {
        return Err(RelayError::InvalidConfig {
            field,
            reason: format!("'{}' is not a hierarchical URL with a host", value),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_is_valid() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_urls() {
        let config = Configuration {
            api_base_url: "not a url".into(),
            ..Configuration::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().contains("apiBaseUrl"));

        let config = Configuration {
            file_server_url: "mailto:someone@example.com".into(),
            ..Configuration::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_shape_and_extra_fields() {
        let raw = r#"{
            "apiBaseUrl": "http://10.0.0.5:3000",
            "websocketUrl": "http://10.0.0.5:3000",
            "fileServer": "http://10.0.0.5:5173/videos/",
            "theme": "dark"
        }"#;
        let config: Configuration = serde_json::from_str(raw).unwrap();
        assert_eq!(config.file_server_url, "http://10.0.0.5:5173/videos/");
        assert_eq!(config.extra["theme"], "dark");

        let written = serde_json::to_value(&config).unwrap();
        assert_eq!(written["fileServerUrl"], "http://10.0.0.5:5173/videos/");
        assert_eq!(written["theme"], "dark");
        assert!(written.get("fileServer").is_none());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let raw = r#"{ "apiBaseUrl": "http://localhost:3000" }"#;
        assert!(serde_json::from_str::<Configuration>(raw).is_err());
    }

    #[test]
    fn test_websocket_endpoint() {
        assert_eq!(websocket_endpoint("http://localhost:3000"), "ws://localhost:3000/");
        assert_eq!(websocket_endpoint("https://chat.example/socket"), "wss://chat.example/socket");
        assert_eq!(websocket_endpoint("ws://localhost:9000/ws"), "ws://localhost:9000/ws");
    }
}
