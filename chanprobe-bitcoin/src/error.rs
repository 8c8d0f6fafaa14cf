//! Error types for the Bitcoin Core ledger client.

use bitcoincore_rpc::jsonrpc;
use chanprobe_core::EstimateError;
use thiserror::Error;

/// Result type for Bitcoin RPC operations.
pub type Result<T> = std::result::Result<T, BitcoinError>;

/// Errors that can occur while talking to a Bitcoin Core node.
#[derive(Debug, Error)]
pub enum BitcoinError {
    /// The node could not be reached.
    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    /// The node answered with an error.
    #[error("RPC call failed: {0}")]
    RpcCall(String),

    /// Block not found.
    #[error("block not found: {0}")]
    BlockNotFound(String),

    /// Transaction not found.
    #[error("transaction not found: {0}")]
    TxNotFound(String),

    /// Network mismatch.
    #[error("network mismatch: expected {expected}, got {got}")]
    NetworkMismatch {
        /// Expected network.
        expected: String,
        /// Actual network.
        got: String,
    },

    /// Timeout.
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BitcoinError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BitcoinError::RpcConnection(_) | BitcoinError::Timeout(_))
    }

    /// Reclassify a call error as a missing block.
    pub(crate) fn into_block_not_found(self) -> Self {
        match self {
            BitcoinError::RpcCall(msg) => BitcoinError::BlockNotFound(msg),
            other => other,
        }
    }

    /// Reclassify a call error as a missing transaction.
    pub(crate) fn into_tx_not_found(self) -> Self {
        match self {
            BitcoinError::RpcCall(msg) => BitcoinError::TxNotFound(msg),
            other => other,
        }
    }
}

impl From<bitcoincore_rpc::Error> for BitcoinError {
    fn from(e: bitcoincore_rpc::Error) -> Self {
        match e {
            bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Transport(_))
            | bitcoincore_rpc::Error::Io(_) => BitcoinError::RpcConnection(e.to_string()),
            _ => BitcoinError::RpcCall(e.to_string()),
        }
    }
}

impl From<BitcoinError> for EstimateError {
    fn from(e: BitcoinError) -> Self {
        match e {
            BitcoinError::Timeout(secs) => EstimateError::Timeout(secs),
            BitcoinError::Config(msg) => EstimateError::Config(msg),
            other => EstimateError::Fetch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(BitcoinError::RpcConnection("refused".into()).is_transient());
        assert!(BitcoinError::Timeout(30).is_transient());
        assert!(!BitcoinError::RpcCall("bad".into()).is_transient());
        assert!(!BitcoinError::TxNotFound("x".into()).is_transient());
    }

    #[test]
    fn test_io_error_is_connection_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = BitcoinError::from(bitcoincore_rpc::Error::Io(io));
        assert!(matches!(err, BitcoinError::RpcConnection(_)));
    }

    #[test]
    fn test_returned_error_is_call_failure() {
        let err = BitcoinError::from(bitcoincore_rpc::Error::ReturnedError("boom".into()));
        assert!(matches!(err, BitcoinError::RpcCall(_)));
        assert!(matches!(
            err.into_tx_not_found(),
            BitcoinError::TxNotFound(_)
        ));
    }

    #[test]
    fn test_into_estimate_error() {
        assert!(matches!(
            EstimateError::from(BitcoinError::Timeout(5)),
            EstimateError::Timeout(5)
        ));
        assert!(matches!(
            EstimateError::from(BitcoinError::BlockNotFound("h".into())),
            EstimateError::Fetch(_)
        ));
    }
}
