//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (delays > 0, addresses parse)
//! - Check the proxy prefix is a usable path
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelaySettings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::net::SocketAddr;

use crate::config::schema::RelaySettings;

/// A single semantic problem in the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and collect all failures.
pub fn validate_settings(settings: &RelaySettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", settings.listener.bind_address),
        ));
    }

    let prefix = &settings.proxy.prefix;
    if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
        errors.push(ValidationError::new(
            "proxy.prefix",
            format!("'{}' must be an absolute path below the root", prefix),
        ));
    }
    if settings.proxy.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new("proxy.request_timeout_secs", "must be positive"));
    }

    if settings.store.storage_key.is_empty() {
        errors.push(ValidationError::new("store.storage_key", "must not be empty"));
    }

    let channel = &settings.channel;
    if channel.initial_delay_ms == 0 {
        errors.push(ValidationError::new("channel.initial_delay_ms", "must be positive"));
    }
    if channel.max_delay_ms < channel.initial_delay_ms {
        errors.push(ValidationError::new(
            "channel.max_delay_ms",
            "must not be below channel.initial_delay_ms",
        ));
    }
    if channel.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("channel.connect_timeout_ms", "must be positive"));
    }

    if matches!(settings.admin.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
        errors.push(ValidationError::new("admin.api_key", "must not be blank when set"));
    }

    if settings.observability.metrics_enabled
        && settings
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                settings.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&RelaySettings::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut settings = RelaySettings::default();
        settings.listener.bind_address = "localhost".into();
        settings.proxy.prefix = "/".into();
        settings.channel.max_delay_ms = 10;
        settings.admin.api_key = Some("  ".into());

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "proxy.prefix",
                "channel.max_delay_ms",
                "admin.api_key",
            ]
        );
    }

    #[test]
    fn test_root_prefix_is_rejected() {
        for prefix in ["/", "//", "", "api/proxy"] {
            let mut settings = RelaySettings::default();
            settings.proxy.prefix = prefix.into();
            let errors = validate_settings(&settings).unwrap_err();
            assert_eq!(errors[0].field, "proxy.prefix", "prefix {prefix:?}");
        }
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut settings = RelaySettings::default();
        settings.observability.metrics_address = "nowhere".into();
        assert!(validate_settings(&settings).is_ok());

        settings.observability.metrics_enabled = true;
        assert!(validate_settings(&settings).is_err());
    }
}
