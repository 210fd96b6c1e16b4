//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// Configuration shared by the provider facade and value coercion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a caller waits for one provider round trip
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Interval at which a blocked caller re-checks a pending round trip
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Sibling property that tells whether a date control works in local time
    #[serde(default = "default_timezone_property")]
    pub timezone_property: String,

    /// Properties the provider cannot read natively
    #[serde(default = "default_unsupported_properties")]
    pub unsupported_properties: Vec<String>,

    /// chrono patterns tried, in order, for locale-formatted date strings
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    /// Fixed UTC offset standing in for "local" time (host zone when unset)
    #[serde(default)]
    pub local_offset_minutes: Option<i32>,

    /// Transport error fragments that mean the hosted app must be republished
    #[serde(default = "default_outdated_app_signatures")]
    pub outdated_app_signatures: Vec<String>,
}

fn default_timeout_ms() -> u64 { 30_000 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_timezone_property() -> String { "DateTimeZone".to_string() }

fn default_unsupported_properties() -> Vec<String> {
    vec!["Options".to_string()]
}

fn default_date_formats() -> Vec<String> {
    [
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %I:%M %p",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_outdated_app_signatures() -> Vec<String> {
    vec![
        "PowerAppsTestEngine is not defined".to_string(),
        "is not a function".to_string(),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            timezone_property: default_timezone_property(),
            unsupported_properties: default_unsupported_properties(),
            date_formats: default_date_formats(),
            local_offset_minutes: None,
            outdated_app_signatures: default_outdated_app_signatures(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the facade cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(offset) = self.local_offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(Error::InvalidConfig(format!(
                    "local_offset_minutes out of range: {}",
                    offset
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Whether `property` must not be fetched through the provider
    pub fn is_unsupported(&self, property: &str) -> bool {
        self.unsupported_properties
            .iter()
            .any(|p| p.eq_ignore_ascii_case(property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("engine.toml")).unwrap();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.timezone_property, "DateTimeZone");
        assert!(config.is_unsupported("options"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "timeout_ms = 250\nlocal_offset_minutes = -300\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.local_offset_minutes, Some(-300));
        assert_eq!(config.poll_interval_ms, 100);
        assert!(!config.date_formats.is_empty());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "timeout_ms = 0\n").unwrap();

        assert!(matches!(
            EngineConfig::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_error_variants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "timeout_ms = \"soon\"\n").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(Error::InvalidConfig(_))
        ));

        // A directory exists but cannot be read as a file
        assert!(matches!(EngineConfig::load(dir.path()), Err(Error::Io(_))));
    }
}
