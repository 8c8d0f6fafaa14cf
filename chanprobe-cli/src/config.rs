//! TOML settings file with `[estimator]`, `[bitcoin]` and `[registry]`
//! tables. Every table and field is optional.

use std::path::Path;

use anyhow::{Context, Result};
use chanprobe_bitcoin::BitcoinConfig;
use chanprobe_core::EstimatorConfig;
use chanprobe_registry::RegistryConfig;
use serde::{Deserialize, Serialize};

/// Settings for one estimation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub estimator: EstimatorConfig,
    pub bitcoin: BitcoinConfig,
    pub registry: RegistryConfig,
}

impl Settings {
    /// Read settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse configuration file {}", path.display()))
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
