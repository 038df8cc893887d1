//! Server settings.
//!
//! Settings are stored as a camelCase JSON document. Every field is
//! optional; missing fields fall back to the defaults below so an empty
//! object `{}` is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Failed to read settings file '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The settings document is not valid JSON for [`ServerSettings`].
    #[error("Invalid settings: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A setting has an unusable value.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Runtime settings for the live data server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Address of the HTTP status endpoint; `None` disables it.
    pub status_addr: Option<String>,

    /// Handshake path of the values channel.
    pub values_path: String,

    /// Handshake path of the events channel.
    pub events_path: String,

    /// How long a push to one observer may block before it is dropped.
    pub send_timeout_ms: u64,

    /// Frames buffered per connection before pushes start timing out.
    pub outbound_queue: usize,

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            status_addr: Some("0.0.0.0:8001".to_string()),
            values_path: "/actual_data".to_string(),
            events_path: "/events".to_string(),
            send_timeout_ms: 1000,
            outbound_queue: 64,
            log_filter: "info,tagcast_server=debug".to_string(),
        }
    }
}

impl ServerSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check values that deserialize fine but cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path) in [("valuesPath", &self.values_path), ("eventsPath", &self.events_path)] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{path}' must start with '/'"),
                });
            }
        }
        if self.values_path == self.events_path {
            return Err(ConfigError::InvalidValue {
                field: "eventsPath",
                reason: "values and events channels need distinct paths".to_string(),
            });
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sendTimeoutMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.outbound_queue == 0 {
            return Err(ConfigError::InvalidValue {
                field: "outboundQueue",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = ServerSettings::from_json("{}").unwrap();
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(settings.values_path, "/actual_data");
        assert_eq!(settings.events_path, "/events");
    }

    #[test]
    fn test_partial_document() {
        let settings =
            ServerSettings::from_json(r#"{"bindAddr": "127.0.0.1:9000", "statusAddr": null}"#)
                .unwrap();

        assert_eq!(settings.bind_addr, "127.0.0.1:9000");
        assert_eq!(settings.status_addr, None);
        assert_eq!(settings.send_timeout_ms, 1000);
    }

    #[test]
    fn test_invalid_json() {
        let err = ServerSettings::from_json("{ bindAddr").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_paths_must_be_absolute_and_distinct() {
        let err = ServerSettings::from_json(r#"{"valuesPath": "values"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "valuesPath", .. }));

        let err =
            ServerSettings::from_json(r#"{"valuesPath": "/live", "eventsPath": "/live"}"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "eventsPath", .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = ServerSettings::from_json(r#"{"sendTimeoutMs": 0}"#).unwrap_err();
        assert!(err.to_string().contains("sendTimeoutMs"));
    }

    #[test]
    fn test_missing_file() {
        let err = ServerSettings::load("/nonexistent/tagcast.json").unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
