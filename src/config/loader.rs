//! Settings loading from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::config::schema::RelaySettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Parse(e) => write!(f, "Parse error: {}", e),
            SettingsError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Load and validate settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<RelaySettings, SettingsError> {
    let content = fs::read_to_string(path).map_err(SettingsError::Io)?;
    parse_settings(&content)
}

/// Like [`load_settings`], but a missing file yields `None`.
///
/// Runs before logging is installed, so callers report the outcome.
pub fn load_settings_if_present(path: &Path) -> Result<Option<RelaySettings>, SettingsError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_settings(&content).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SettingsError::Io(e)),
    }
}

/// Parse and validate a TOML settings document.
pub fn parse_settings(content: &str) -> Result<RelaySettings, SettingsError> {
    let settings: RelaySettings = toml::from_str(content).map_err(SettingsError::Parse)?;

    validate_settings(&settings).map_err(SettingsError::Validation)?;

    Ok(settings)
}
