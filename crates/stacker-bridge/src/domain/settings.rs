//! Optional TOML settings file.
//!
//! ```toml
//! [bridge]
//! address = "192.168.1.20:8080/ws"
//! reconnect_delay_ms = 2000
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Every field is optional.  Values given on the command line or through
//! `STACKER_*` environment variables take precedence over the file; `RUST_LOG`
//! takes precedence over `[logging] level`.
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the file, so a missing file
//! and an empty file behave the same.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::config::BridgeConfig;

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("I/O error reading settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level settings file schema.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[bridge]` table.  Absent fields defer to the CLI or the built-in default.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    pub address: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}

/// `[logging]` table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// `tracing` filter directive: `"error"`, `"warn"`, `"info"`, `"debug"`, ...
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Settings {
    /// Reads and parses the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file cannot be read and
    /// [`SettingsError::Parse`] if it is not valid settings TOML.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] on invalid TOML or unknown fields.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolves the runtime configuration.
    ///
    /// Each `Some` override wins over the file, and the file wins over
    /// [`BridgeConfig::default`].
    pub fn resolve(
        &self,
        address: Option<String>,
        reconnect_delay_ms: Option<u64>,
    ) -> BridgeConfig {
        let defaults = BridgeConfig::default();
        BridgeConfig {
            address: address
                .or_else(|| self.bridge.address.clone())
                .unwrap_or(defaults.address),
            reconnect_delay: reconnect_delay_ms
                .or(self.bridge.reconnect_delay_ms)
                .map_or(defaults.reconnect_delay, Duration::from_millis),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        // Arrange / Act
        let settings = Settings::from_toml_str("").unwrap();

        // Assert
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.resolve(None, None), BridgeConfig::default());
    }

    #[test]
    fn test_file_values_apply_without_overrides() {
        // Arrange
        let text = r#"
            [bridge]
            address = "192.168.1.20:8080/ws"
            reconnect_delay_ms = 2500

            [logging]
            level = "debug"
        "#;

        // Act
        let settings = Settings::from_toml_str(text).unwrap();
        let config = settings.resolve(None, None);

        // Assert
        assert_eq!(config.address, "192.168.1.20:8080/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(2500));
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let settings = Settings::from_toml_str(
            "[bridge]\naddress = \"file:1/ws\"\nreconnect_delay_ms = 10\n",
        )
        .unwrap();

        let config = settings.resolve(Some("cli:2/ws".to_string()), Some(20));

        assert_eq!(config.address, "cli:2/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(20));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = Settings::from_toml_str("[bridge]\nport = 80\n");
        assert!(matches!(result, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Settings::load(Path::new("/nonexistent/stacker/settings.toml"));
        assert!(matches!(result, Err(SettingsError::Io { .. })));
    }
}
