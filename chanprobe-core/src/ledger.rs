//! Ledger node interface consumed by the estimator.
//!
//! Implement [`LedgerClient`] to sample a new kind of node. Every call may
//! hit the network. Block count, block hash and block failures abort the
//! run; `raw_transaction` failures during classification reject only the
//! transaction being classified.

use async_trait::async_trait;
use bitcoin::{Amount, Block, BlockHash, OutPoint, Transaction, Txid};

use crate::errors::{EstimateError, Result};

/// Read access to a full ledger node.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Height of the current best block.
    async fn block_count(&self) -> Result<u64>;

    /// Hash of the block at `height` on the best chain.
    async fn block_hash(&self, height: u64) -> Result<BlockHash>;

    /// Full block by hash.
    async fn block(&self, hash: &BlockHash) -> Result<Block>;

    /// Any transaction by id, confirmed or not.
    async fn raw_transaction(&self, txid: &Txid) -> Result<Transaction>;
}

/// Resolves the value of an output spent by a transaction input.
///
/// The classifier uses this to learn a candidate channel's capacity from
/// its funding output. Errors are never fatal there.
#[async_trait]
pub trait PriorOutputSource: Send + Sync {
    /// Value locked in `outpoint`.
    async fn prior_output_value(&self, outpoint: &OutPoint) -> Result<Amount>;
}

/// [`PriorOutputSource`] that looks funding transactions up on a ledger.
pub struct LedgerOutputs<'a, L: ?Sized>(pub &'a L);

#[async_trait]
impl<'a, L: LedgerClient + ?Sized> PriorOutputSource for LedgerOutputs<'a, L> {
    async fn prior_output_value(&self, outpoint: &OutPoint) -> Result<Amount> {
        let tx = self.0.raw_transaction(&outpoint.txid).await?;
        tx.output
            .get(outpoint.vout as usize)
            .map(|out| out.value)
            .ok_or(EstimateError::MissingOutput(*outpoint))
    }
}
