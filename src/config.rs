//! Synchronization settings.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::validation::validate_symbol;

/// Default minimum spacing between two accepted writes for one account.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Default contract data key holding the profile value.
pub const DEFAULT_DATA_KEY: &str = "profile";

/// Default IPFS HTTP API endpoint.
pub const DEFAULT_IPFS_API_URL: &str = "http://localhost:5001";

/// Default limit on a single content-store request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the cooldown, in seconds.
pub const ENV_COOLDOWN_SECS: &str = "PROFILE_COOLDOWN_SECS";

/// Environment variable overriding the data key.
pub const ENV_DATA_KEY: &str = "PROFILE_DATA_KEY";

/// Environment variable overriding the IPFS endpoint.
pub const ENV_IPFS_API_URL: &str = "IPFS_API_URL";

/// Environment variable overriding the content-store request timeout, in
/// seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "IPFS_TIMEOUT_SECS";

/// Errors raised while loading or validating settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// The data key is not a valid contract symbol.
    #[error("data key {0:?} is not a valid symbol")]
    InvalidDataKey(String),

    /// A required value is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Settings for [`crate::ProfileSyncService`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum seconds between two accepted on-chain writes per account.
    pub cooldown_secs: u64,

    /// Contract data key shared by every account's profile slot.
    pub data_key: String,

    /// Base URL of the IPFS HTTP API.
    pub ipfs_api_url: String,

    /// Upper bound on one content-store request, connect to last byte.
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            data_key: DEFAULT_DATA_KEY.to_string(),
            ipfs_api_url: DEFAULT_IPFS_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Load settings from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_COOLDOWN_SECS) {
            config.cooldown_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_COOLDOWN_SECS,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup(ENV_DATA_KEY) {
            config.data_key = raw.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_IPFS_API_URL) {
            config.ipfs_api_url = raw.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_REQUEST_TIMEOUT_SECS,
                    value: raw.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the cooldown window.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_secs = cooldown.as_secs();
        self
    }

    /// Set the data key.
    pub fn with_data_key(mut self, data_key: impl Into<String>) -> Self {
        self.data_key = data_key.into();
        self
    }

    /// Set the IPFS endpoint.
    pub fn with_ipfs_api_url(mut self, url: impl Into<String>) -> Self {
        self.ipfs_api_url = url.into();
        self
    }

    /// Set the content-store request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Content-store request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Cooldown window as a duration.
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !validate_symbol(&self.data_key) {
            return Err(ConfigError::InvalidDataKey(self.data_key.clone()));
        }
        if self.ipfs_api_url.trim().is_empty() {
            return Err(ConfigError::Empty(ENV_IPFS_API_URL));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero(ENV_REQUEST_TIMEOUT_SECS));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.cooldown(), Duration::from_secs(60));
        assert_eq!(config.data_key, "profile");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            (ENV_COOLDOWN_SECS, " 300 "),
            (ENV_DATA_KEY, "chioma_profile"),
            (ENV_IPFS_API_URL, "http://ipfs:5001"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.cooldown_secs, 300);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.data_key, "chioma_profile");
        assert_eq!(config.ipfs_api_url, "http://ipfs:5001");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[(ENV_COOLDOWN_SECS, "soon")])),
            Err(ConfigError::InvalidValue { key: ENV_COOLDOWN_SECS, .. })
        ));
        assert_eq!(
            SyncConfig::from_lookup(lookup(&[(ENV_DATA_KEY, "user-profile")])),
            Err(ConfigError::InvalidDataKey("user-profile".to_string()))
        );
        assert_eq!(
            SyncConfig::from_lookup(lookup(&[(ENV_IPFS_API_URL, " ")])),
            Err(ConfigError::Empty(ENV_IPFS_API_URL))
        );
        assert!(matches!(
            SyncConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, "later")])),
            Err(ConfigError::InvalidValue { key: ENV_REQUEST_TIMEOUT_SECS, .. })
        ));
        assert_eq!(
            SyncConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, "0")])),
            Err(ConfigError::Zero(ENV_REQUEST_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SyncConfig = serde_json::from_str(r#"{"cooldown_secs": 5}"#).unwrap();
        assert_eq!(config.cooldown_secs, 5);
        assert_eq!(config.data_key, DEFAULT_DATA_KEY);
    }

    #[test]
    fn test_builders() {
        let config = SyncConfig::default()
            .with_cooldown(Duration::from_secs(10))
            .with_data_key("p")
            .with_ipfs_api_url("http://x")
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.cooldown_secs, 10);
        assert_eq!(config.request_timeout_secs, 3);
        assert!(config.validate().is_ok());
    }
}
