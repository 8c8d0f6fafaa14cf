//! [`LedgerClient`] over Bitcoin Core RPC.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::{Block, BlockHash, Transaction, Txid};
use chanprobe_core::{EstimateError, LedgerClient};
use tracing::{info, warn};

use crate::config::BitcoinConfig;
use crate::error::{BitcoinError, Result};
use crate::rpc::BitcoinRpc;

/// Bitcoin Core node as a ledger.
///
/// The RPC client blocks, so every call runs on tokio's blocking pool
/// under the configured timeout. Calls that fail to reach the node are
/// retried with exponential backoff; anything else fails at once.
pub struct BitcoinLedger {
    rpc: Arc<BitcoinRpc>,
    config: BitcoinConfig,
}

impl BitcoinLedger {
    /// Create a ledger client without contacting the node.
    pub fn new(config: BitcoinConfig) -> Result<Self> {
        let rpc = Arc::new(BitcoinRpc::new(config.clone())?);
        Ok(Self { rpc, config })
    }

    /// Create a ledger client and check the node answers on the expected
    /// network.
    pub async fn connect(config: BitcoinConfig) -> Result<Self> {
        let ledger = Self::new(config)?;
        ledger.call("getblockchaininfo", |rpc| rpc.test_connection()).await?;

        info!(
            url = %ledger.config.rpc_url,
            network = ledger.config.network.name(),
            "Connected to Bitcoin node"
        );
        Ok(ledger)
    }

    /// Get the configuration.
    pub fn config(&self) -> &BitcoinConfig {
        &self.config
    }

    /// Get the RPC client.
    pub fn rpc(&self) -> &BitcoinRpc {
        &self.rpc
    }

    async fn call<T, F>(&self, method: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&BitcoinRpc) -> Result<T> + Clone + Send + 'static,
    {
        let mut attempt = 0u32;

        loop {
            let rpc = Arc::clone(&self.rpc);
            let op = op.clone();
            let task = tokio::task::spawn_blocking(move || op(&rpc));

            let outcome = match tokio::time::timeout(self.config.timeout(), task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join)) => {
                    Err(BitcoinError::RpcCall(format!("{} aborted: {}", method, join)))
                }
                // The blocking call is abandoned, not cancelled: it keeps its
                // pool thread until the transport gives up.
                Err(_) => Err(BitcoinError::Timeout(self.config.timeout_secs)),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.backoff(attempt);
                    warn!(method, attempt, ?delay, error = %e, "Retrying RPC call");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl LedgerClient for BitcoinLedger {
    async fn block_count(&self) -> chanprobe_core::Result<u64> {
        Ok(self.call("getblockcount", |rpc| rpc.get_block_count()).await?)
    }

    async fn block_hash(&self, height: u64) -> chanprobe_core::Result<BlockHash> {
        Ok(self
            .call("getblockhash", move |rpc| rpc.get_block_hash(height))
            .await?)
    }

    async fn block(&self, hash: &BlockHash) -> chanprobe_core::Result<Block> {
        let hash = *hash;
        Ok(self.call("getblock", move |rpc| rpc.get_block(&hash)).await?)
    }

    async fn raw_transaction(&self, txid: &Txid) -> chanprobe_core::Result<Transaction> {
        let txid = *txid;
        self.call("getrawtransaction", move |rpc| rpc.get_raw_transaction(&txid))
            .await
            .map_err(EstimateError::from)
    }
}
