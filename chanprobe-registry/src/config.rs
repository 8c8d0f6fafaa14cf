//! Registry endpoint configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Public search endpoint of the reference registry.
pub const DEFAULT_ENDPOINT: &str = "https://1ml.com/search";

/// Configuration for the HTTP registry oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Search endpoint receiving the form submission.
    pub endpoint: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl RegistryConfig {
    /// Create a configuration for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: 10,
            user_agent: concat!("chanprobe/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(RegistryError::Config(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }

        if self.timeout_secs == 0 {
            return Err(RegistryError::Config(
                "Timeout must be at least 1 second".into(),
            ));
        }

        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.user_agent.starts_with("chanprobe/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(RegistryConfig::new("ftp://example").validate().is_err());
        assert!(RegistryConfig::default().with_timeout(0).validate().is_err());
    }
}
