//! Error types for the estimation core.

use bitcoin::{BlockHash, OutPoint};
use thiserror::Error;

/// Result type for estimation operations.
pub type Result<T> = std::result::Result<T, EstimateError>;

/// Errors that can occur while sampling and estimating.
///
/// A failure is fatal when it happens while walking a window: block count,
/// block hash and block fetches. The same errors raised while resolving a
/// funding output during classification only reject that transaction.
#[derive(Debug, Error)]
pub enum EstimateError {
    /// A block, block hash or transaction could not be fetched.
    #[error("ledger fetch failed: {0}")]
    Fetch(String),

    /// A ledger call did not answer in time.
    #[error("ledger call timed out after {0} seconds")]
    Timeout(u64),

    /// The referenced output does not exist in its transaction.
    #[error("output {0} not found in its transaction")]
    MissingOutput(OutPoint),

    /// Sampling bounds cannot produce a full window.
    #[error("invalid sampling window: {0}")]
    InvalidWindow(String),

    /// A backward walk tried to step past the first block of the chain.
    #[error("block walk reached the chain origin at {0}")]
    ChainOrigin(BlockHash),

    /// Script could not be parsed or analysed.
    #[error("script error: {0}")]
    Script(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<bitcoin::script::Error> for EstimateError {
    fn from(e: bitcoin::script::Error) -> Self {
        EstimateError::Script(e.to_string())
    }
}
