//! Error types for registry lookups.

use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while querying the public channel registry.
///
/// These never leave the crate through [`RegistryOracle`]; a failed lookup
/// answers "not public".
///
/// [`RegistryOracle`]: chanprobe_core::RegistryOracle
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Transport failure or timeout.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with an unexpected status.
    #[error("registry answered with status {0}")]
    Status(u16),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
