//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecyclePolicy;
use crate::models::ReminderChannel;

/// Days a prescription stays valid after its issue date.
pub const DEFAULT_VALIDITY_DAYS: i64 = 180;

/// Upper bound accepted for `validity_days` (ten years).
pub const MAX_VALIDITY_DAYS: i64 = 3650;

/// Days before expiry at which a prescription is reported as expiring (inclusive).
pub const DEFAULT_EXPIRING_WINDOW_DAYS: i64 = 14;

pub const DEFAULT_REFERENCE_PREFIX: &str = "RX";

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the lifecycle engine. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validity_days: i64,
    pub expiring_window_days: i64,
    pub reference_prefix: String,
    pub default_channel: ReminderChannel,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validity_days: DEFAULT_VALIDITY_DAYS,
            expiring_window_days: DEFAULT_EXPIRING_WINDOW_DAYS,
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            default_channel: ReminderChannel::Email,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validity_days <= 0 || self.validity_days > MAX_VALIDITY_DAYS {
            return Err(ConfigError::Invalid(format!(
                "validity_days must be in 1..={}, got {}",
                MAX_VALIDITY_DAYS, self.validity_days
            )));
        }
        if self.expiring_window_days < 0 || self.expiring_window_days >= self.validity_days {
            return Err(ConfigError::Invalid(format!(
                "expiring_window_days must be in 0..{}, got {}",
                self.validity_days, self.expiring_window_days
            )));
        }
        if self.reference_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("reference_prefix must not be empty".into()));
        }
        if let Err(e) = EnvFilter::try_new(&self.log_filter) {
            return Err(ConfigError::Invalid(format!(
                "log_filter {:?} is not a valid filter: {}",
                self.log_filter, e
            )));
        }
        Ok(())
    }

    /// Date rules used by the status deriver.
    pub fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            validity_days: self.validity_days,
            expiring_window_days: self.expiring_window_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.validity_days, 180);
        assert_eq!(config.expiring_window_days, 14);
        assert_eq!(config.reference_prefix, "RX");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"reference_prefix": "MED"}"#).unwrap();
        assert_eq!(config.reference_prefix, "MED");
        assert_eq!(config.validity_days, 180);
        assert_eq!(config.default_channel, ReminderChannel::Email);
    }

    #[test]
    fn test_channel_from_json() {
        let config = EngineConfig::from_json_str(r#"{"default_channel": "sms"}"#).unwrap();
        assert_eq!(config.default_channel, ReminderChannel::Sms);
    }

    #[test]
    fn test_rejects_window_wider_than_validity() {
        let result = EngineConfig::from_json_str(r#"{"validity_days": 10, "expiring_window_days": 14}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_non_positive_validity() {
        let result = EngineConfig::from_json_str(r#"{"validity_days": 0}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_validity_beyond_ten_years() {
        let result = EngineConfig::from_json_str(r#"{"validity_days": 1000000000}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = EngineConfig::from_json_str(r#"{"validity_days": 3650}"#).unwrap();
        assert_eq!(config.policy().validity_days, MAX_VALIDITY_DAYS);
    }

    #[test]
    fn test_log_filter_is_validated() {
        let config = EngineConfig::from_json_str(r#"{"log_filter": "warn,rx_lifecycle_core=debug"}"#).unwrap();
        assert_eq!(config.log_filter, "warn,rx_lifecycle_core=debug");

        let result = EngineConfig::from_json_str(r#"{"log_filter": "rx_lifecycle_core=loud"}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = EngineConfig::from_json_str("{validity_days: 180");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"validity_days": 90, "expiring_window_days": 7}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.validity_days, 90);
        assert_eq!(config.policy().expiring_window_days, 7);
    }
}
