//! Random block windows over ledger history.
//!
//! A window starts at a uniformly drawn height and walks backwards
//! through `prev_blockhash` links, one fetch per block. Windows are lazy:
//! nothing is fetched until [`BlockWindow::next_block`] is polled.

use std::sync::Arc;

use bitcoin::hashes::Hash;
use bitcoin::{Block, BlockHash};
use rand::Rng;
use tracing::trace;

use crate::errors::{EstimateError, Result};
use crate::ledger::LedgerClient;

/// Draws windows of consecutive blocks from a ledger.
pub struct BlockWindowSampler<L: ?Sized> {
    ledger: Arc<L>,
}

impl<L: LedgerClient + ?Sized> BlockWindowSampler<L> {
    /// Create a sampler over `ledger`.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Draw a window of `window_size` blocks ending at a random height in
    /// `[start_bound, end_bound)`.
    ///
    /// Fails up front if some height in the range could not support a
    /// full window above the genesis block.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        start_bound: u64,
        end_bound: u64,
        window_size: u64,
    ) -> Result<BlockWindow<L>> {
        if window_size == 0 {
            return Err(EstimateError::InvalidWindow("window size is zero".into()));
        }

        if end_bound <= start_bound {
            return Err(EstimateError::InvalidWindow(format!(
                "empty height range [{}, {})",
                start_bound, end_bound
            )));
        }

        if start_bound.saturating_add(1) < window_size {
            return Err(EstimateError::InvalidWindow(format!(
                "height {} is too low for a window of {} blocks",
                start_bound, window_size
            )));
        }

        let height = rng.gen_range(start_bound..end_bound);
        trace!(height, window_size, "Drew window start");

        Ok(BlockWindow {
            ledger: Arc::clone(&self.ledger),
            start_height: height,
            window_size,
            remaining: window_size,
            cursor: Cursor::Height(height),
        })
    }
}

/// Where the next fetch of a window starts from.
#[derive(Debug, Clone, Copy)]
enum Cursor {
    Height(u64),
    Hash(BlockHash),
    Origin(BlockHash),
}

/// Lazy backward walk over `window_size` blocks.
pub struct BlockWindow<L: ?Sized> {
    ledger: Arc<L>,
    start_height: u64,
    window_size: u64,
    remaining: u64,
    cursor: Cursor,
}

impl<L: LedgerClient + ?Sized> BlockWindow<L> {
    /// Height of the first (most recent) block of the window.
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Total number of blocks the window yields.
    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Blocks not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Fetch the next block, most recent first.
    ///
    /// Returns `Ok(None)` once `window_size` blocks were yielded. Any fetch
    /// failure ends the walk.
    pub async fn next_block(&mut self) -> Result<Option<Block>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let hash = match self.cursor {
            Cursor::Height(height) => self.ledger.block_hash(height).await?,
            Cursor::Hash(hash) => hash,
            Cursor::Origin(genesis) => return Err(EstimateError::ChainOrigin(genesis)),
        };

        let block = self.ledger.block(&hash).await?;
        self.remaining -= 1;

        let prev = block.header.prev_blockhash;
        self.cursor = if prev == BlockHash::all_zeros() {
            Cursor::Origin(hash)
        } else {
            Cursor::Hash(prev)
        };

        Ok(Some(block))
    }

    /// Walk the whole window into memory.
    pub async fn collect(mut self) -> Result<Vec<Block>> {
        let mut blocks = Vec::with_capacity(self.window_size as usize);
        while let Some(block) = self.next_block().await? {
            blocks.push(block);
        }
        Ok(blocks)
    }
}
