//! Bitcoin Core connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bitcoin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet.
    #[default]
    Mainnet,
    /// Bitcoin testnet.
    Testnet,
    /// Bitcoin signet.
    Signet,
    /// Bitcoin regtest (local development).
    Regtest,
}

impl Network {
    /// Get the network name.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        }
    }

    /// Convert to bitcoin crate network type.
    pub fn to_bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

/// Configuration for the Bitcoin Core ledger client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// RPC endpoint URL.
    pub rpc_url: String,

    /// RPC username (optional).
    pub rpc_user: Option<String>,

    /// RPC password (optional).
    pub rpc_password: Option<String>,

    /// Network the node is expected to follow.
    pub network: Network,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Retries for a call that failed to reach the node.
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry.
    pub retry_backoff_ms: u64,
}

impl BitcoinConfig {
    /// Create a new configuration.
    pub fn new(rpc_url: impl Into<String>, network: Network) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            rpc_user: None,
            rpc_password: None,
            network,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }

    /// Create configuration for mainnet.
    pub fn mainnet(rpc_url: impl Into<String>) -> Self {
        Self::new(rpc_url, Network::Mainnet)
    }

    /// Create configuration for regtest.
    pub fn regtest(rpc_url: impl Into<String>) -> Self {
        Self::new(rpc_url, Network::Regtest)
    }

    /// Set RPC authentication.
    pub fn with_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.rpc_user = Some(user.into());
        self.rpc_password = Some(password.into());
        self
    }

    /// Set per-call timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set retry policy.
    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), super::BitcoinError> {
        if self.rpc_url.is_empty() {
            return Err(super::BitcoinError::Config("RPC URL is required".into()));
        }

        if self.rpc_user.is_some() != self.rpc_password.is_some() {
            return Err(super::BitcoinError::Config(
                "RPC user and password must be set together".into(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(super::BitcoinError::Config(
                "Timeout must be at least 1 second".into(),
            ));
        }

        Ok(())
    }
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self::mainnet("http://127.0.0.1:8332")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = BitcoinConfig::regtest("http://localhost:18443")
            .with_auth("user", "pass")
            .with_timeout(5)
            .with_retries(2, 100);

        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.rpc_user, Some("user".to_string()));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(BitcoinConfig::new("", Network::Mainnet).validate().is_err());
        assert!(BitcoinConfig::default().with_timeout(0).validate().is_err());

        let mut half_auth = BitcoinConfig::default();
        half_auth.rpc_user = Some("user".into());
        assert!(half_auth.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = BitcoinConfig::default().with_retries(4, 250);
        assert_eq!(config.backoff(1), Duration::from_millis(250));
        assert_eq!(config.backoff(2), Duration::from_millis(500));
        assert_eq!(config.backoff(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_network_from_toml() {
        let config: BitcoinConfig = toml::from_str(
            r#"
            rpc_url = "http://node:8332"
            network = "signet"
            "#,
        )
        .unwrap();

        assert_eq!(config.network, Network::Signet);
        assert_eq!(config.network.to_bitcoin_network(), bitcoin::Network::Signet);
        assert_eq!(config.timeout_secs, 30);
    }
}
