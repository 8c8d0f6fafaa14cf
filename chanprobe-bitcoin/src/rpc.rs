//! Bitcoin RPC client wrapper.

use bitcoin::{Block, BlockHash, Transaction, Txid};
use bitcoincore_rpc::{Auth, Client, RpcApi};

use crate::config::BitcoinConfig;
use crate::error::{BitcoinError, Result};

/// Wrapper around the blocking Bitcoin Core RPC client.
pub struct BitcoinRpc {
    client: Client,
    config: BitcoinConfig,
}

impl BitcoinRpc {
    /// Create a new RPC client. No request is sent yet.
    pub fn new(config: BitcoinConfig) -> Result<Self> {
        config.validate()?;

        let auth = match (&config.rpc_user, &config.rpc_password) {
            (Some(user), Some(pass)) => Auth::UserPass(user.clone(), pass.clone()),
            _ => Auth::None,
        };

        let client = Client::new(&config.rpc_url, auth)
            .map_err(|e| BitcoinError::RpcConnection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &BitcoinConfig {
        &self.config
    }

    /// Get current block count.
    pub fn get_block_count(&self) -> Result<u64> {
        Ok(self.client.get_block_count()?)
    }

    /// Get block hash by height.
    pub fn get_block_hash(&self, height: u64) -> Result<BlockHash> {
        self.client
            .get_block_hash(height)
            .map_err(|e| BitcoinError::from(e).into_block_not_found())
    }

    /// Get block by hash.
    pub fn get_block(&self, hash: &BlockHash) -> Result<Block> {
        self.client
            .get_block(hash)
            .map_err(|e| BitcoinError::from(e).into_block_not_found())
    }

    /// Get raw transaction. Needs `txindex` on the node for confirmed
    /// transactions outside the wallet.
    pub fn get_raw_transaction(&self, txid: &Txid) -> Result<Transaction> {
        self.client
            .get_raw_transaction(txid, None)
            .map_err(|e| BitcoinError::from(e).into_tx_not_found())
    }

    /// Test connection to the node.
    pub fn test_connection(&self) -> Result<()> {
        let info = self.client.get_blockchain_info()?;

        // Verify network matches
        let expected = self.config.network.to_bitcoin_network();
        let actual = info.chain;

        if actual != expected {
            return Err(BitcoinError::NetworkMismatch {
                expected: format!("{:?}", expected),
                got: format!("{:?}", actual),
            });
        }

        Ok(())
    }
}
