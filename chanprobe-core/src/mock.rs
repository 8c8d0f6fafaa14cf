//! In-memory ledger and registry for testing and development.
//!
//! [`MockLedger`] serves a synthetic chain built with [`ChainBuilder`];
//! [`StaticRegistry`] answers from a fixed set of public funding outputs.
//! [`fixtures`] builds the transactions and scripts the classifier looks
//! at.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{Amount, Block, BlockHash, OutPoint, Transaction, Txid};
use parking_lot::RwLock;

use crate::errors::{EstimateError, Result};
use crate::ledger::{LedgerClient, PriorOutputSource};
use crate::registry::RegistryOracle;

/// Ledger backed by an in-memory chain.
pub struct MockLedger {
    hashes: Vec<BlockHash>,
    blocks: HashMap<BlockHash, Block>,
    transactions: RwLock<HashMap<Txid, Transaction>>,
    failing: RwLock<HashSet<BlockHash>>,
    block_fetches: AtomicUsize,
}

impl MockLedger {
    /// Hash of the block at `height`.
    pub fn hash_at(&self, height: u64) -> Option<BlockHash> {
        self.hashes.get(height as usize).copied()
    }

    /// Height of the chain tip.
    pub fn tip_height(&self) -> u64 {
        self.hashes.len().saturating_sub(1) as u64
    }

    /// Make every later fetch of the block at `height` fail.
    pub fn fail_block_at(&self, height: u64) {
        if let Some(hash) = self.hash_at(height) {
            self.failing.write().insert(hash);
        }
    }

    /// Make a transaction available to `raw_transaction`.
    pub fn insert_transaction(&self, tx: Transaction) {
        self.transactions.write().insert(tx.compute_txid(), tx);
    }

    /// Number of block fetches served or refused so far.
    pub fn block_fetches(&self) -> usize {
        self.block_fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn block_count(&self) -> Result<u64> {
        Ok(self.tip_height())
    }

    async fn block_hash(&self, height: u64) -> Result<BlockHash> {
        self.hash_at(height)
            .ok_or_else(|| EstimateError::Fetch(format!("no block at height {}", height)))
    }

    async fn block(&self, hash: &BlockHash) -> Result<Block> {
        self.block_fetches.fetch_add(1, Ordering::Relaxed);

        if self.failing.read().contains(hash) {
            return Err(EstimateError::Fetch(format!("simulated failure for {}", hash)));
        }

        self.blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| EstimateError::Fetch(format!("unknown block {}", hash)))
    }

    async fn raw_transaction(&self, txid: &Txid) -> Result<Transaction> {
        self.transactions
            .read()
            .get(txid)
            .cloned()
            .ok_or_else(|| EstimateError::Fetch(format!("unknown transaction {}", txid)))
    }
}

/// Builder for a [`MockLedger`] chain, genesis first.
#[derive(Default)]
pub struct ChainBuilder {
    blocks: Vec<Vec<Transaction>>,
    side_transactions: Vec<Transaction>,
    failing_heights: Vec<u64>,
}

impl ChainBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block holding `transactions` after its coinbase.
    pub fn block(mut self, transactions: Vec<Transaction>) -> Self {
        self.blocks.push(transactions);
        self
    }

    /// Append `count` blocks holding only a coinbase.
    pub fn empty_blocks(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.blocks.push(Vec::new());
        }
        self
    }

    /// Serve a transaction that is not part of any built block.
    pub fn transaction(mut self, tx: Transaction) -> Self {
        self.side_transactions.push(tx);
        self
    }

    /// Fail every fetch of the block at `height`.
    pub fn fail_block(mut self, height: u64) -> Self {
        self.failing_heights.push(height);
        self
    }

    /// Build the ledger.
    pub fn build(self) -> MockLedger {
        let mut hashes = Vec::with_capacity(self.blocks.len());
        let mut blocks = HashMap::with_capacity(self.blocks.len());
        let mut transactions = HashMap::new();
        let mut prev = BlockHash::all_zeros();

        for (height, body) in self.blocks.into_iter().enumerate() {
            let mut txdata = vec![fixtures::coinbase(height as u32)];
            txdata.extend(body);

            let block = fixtures::block(prev, height as u32, txdata);
            let hash = block.block_hash();
            for tx in &block.txdata {
                transactions.insert(tx.compute_txid(), tx.clone());
            }

            hashes.push(hash);
            blocks.insert(hash, block);
            prev = hash;
        }

        for tx in self.side_transactions {
            transactions.insert(tx.compute_txid(), tx);
        }

        let failing = self
            .failing_heights
            .iter()
            .filter_map(|h| hashes.get(*h as usize).copied())
            .collect();

        MockLedger {
            hashes,
            blocks,
            transactions: RwLock::new(transactions),
            failing: RwLock::new(failing),
            block_fetches: AtomicUsize::new(0),
        }
    }
}

/// Registry that knows a fixed set of public funding outputs.
#[derive(Default)]
pub struct StaticRegistry {
    public: RwLock<HashSet<OutPoint>>,
    lookups: AtomicUsize,
}

impl StaticRegistry {
    /// Registry that knows no public channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `funding` as public.
    pub fn with(self, funding: OutPoint) -> Self {
        self.add(funding);
        self
    }

    /// Mark `funding` as public.
    pub fn add(&self, funding: OutPoint) {
        self.public.write().insert(funding);
    }

    /// Number of lookups answered.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RegistryOracle for StaticRegistry {
    async fn is_known_public(&self, funding: &OutPoint) -> bool {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.public.read().contains(funding)
    }
}

/// Funding output values known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticOutputs {
    values: HashMap<OutPoint, Amount>,
}

impl StaticOutputs {
    /// No known outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output value.
    pub fn with(mut self, outpoint: OutPoint, value: Amount) -> Self {
        self.values.insert(outpoint, value);
        self
    }
}

#[async_trait]
impl PriorOutputSource for StaticOutputs {
    async fn prior_output_value(&self, outpoint: &OutPoint) -> Result<Amount> {
        self.values
            .get(outpoint)
            .copied()
            .ok_or(EstimateError::MissingOutput(*outpoint))
    }
}

/// Synthetic scripts, transactions and blocks.
pub mod fixtures {
    use bitcoin::absolute::LockTime;
    use bitcoin::block::{Header, Version as BlockVersion};
    use bitcoin::hashes::Hash;
    use bitcoin::transaction::Version;
    use bitcoin::{
        Amount, Block, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Transaction,
        TxIn, TxMerkleNode, TxOut, Txid, Witness,
    };

    /// A compressed-looking public key.
    pub fn pubkey(seed: u8, index: u8) -> [u8; 33] {
        let mut key = [seed; 33];
        key[0] = 0x02;
        key[1] = index;
        key
    }

    /// `OP_2 <key> <key> OP_2 OP_CHECKMULTISIG`.
    pub fn two_of_two_script(seed: u8) -> ScriptBuf {
        let mut bytes = vec![0x52, 0x21];
        bytes.extend_from_slice(&pubkey(seed, 0));
        bytes.push(0x21);
        bytes.extend_from_slice(&pubkey(seed, 1));
        bytes.extend_from_slice(&[0x52, 0xae]);
        ScriptBuf::from_bytes(bytes)
    }

    /// `[<empty>, <sig>, <sig>, <witness script>]`.
    pub fn cooperative_witness(witness_script: &ScriptBuf) -> Witness {
        Witness::from_slice(&[
            Vec::new(),
            vec![0x30; 71],
            vec![0x30; 72],
            witness_script.to_bytes(),
        ])
    }

    /// P2WPKH output script.
    pub fn p2wpkh_script(seed: u8) -> ScriptBuf {
        let mut bytes = vec![0x00, 0x14];
        bytes.extend_from_slice(&[seed; 20]);
        ScriptBuf::from_bytes(bytes)
    }

    /// P2WSH output script.
    pub fn p2wsh_script(seed: u8) -> ScriptBuf {
        let mut bytes = vec![0x00, 0x20];
        bytes.extend_from_slice(&[seed; 32]);
        ScriptBuf::from_bytes(bytes)
    }

    /// P2PKH output script.
    pub fn p2pkh_script(seed: u8) -> ScriptBuf {
        let mut bytes = vec![0x76, 0xa9, 0x14];
        bytes.extend_from_slice(&[seed; 20]);
        bytes.extend_from_slice(&[0x88, 0xac]);
        ScriptBuf::from_bytes(bytes)
    }

    /// An outpoint that no built transaction creates.
    pub fn funding_outpoint(seed: u32) -> OutPoint {
        OutPoint {
            txid: seeded_txid(seed),
            vout: 0,
        }
    }

    /// Transaction whose only output is a channel funding output.
    pub fn funding_tx(seed: u32, capacity: Amount) -> Transaction {
        transaction(
            vec![witness_input(
                OutPoint {
                    txid: seeded_txid(seed),
                    vout: 1,
                },
                Witness::from_slice(&[vec![0x30; 71], pubkey(seed as u8, 9).to_vec()]),
            )],
            vec![TxOut {
                value: capacity,
                script_pubkey: p2wsh_script(seed as u8),
            }],
        )
    }

    /// Cooperative close of the channel funded at `funding`.
    pub fn cooperative_close(funding: OutPoint, seed: u8) -> Transaction {
        let witness = cooperative_witness(&two_of_two_script(seed));
        transaction(
            vec![witness_input(funding, witness)],
            vec![
                TxOut {
                    value: Amount::from_sat(600_000),
                    script_pubkey: p2wpkh_script(seed),
                },
                TxOut {
                    value: Amount::from_sat(390_000),
                    script_pubkey: p2wsh_script(seed.wrapping_add(1)),
                },
            ],
        )
    }

    /// Ordinary single-key payment.
    pub fn payment(seed: u32) -> Transaction {
        transaction(
            vec![witness_input(
                OutPoint {
                    txid: seeded_txid(seed),
                    vout: 2,
                },
                Witness::from_slice(&[vec![0x30; 71], pubkey(seed as u8, 7).to_vec()]),
            )],
            vec![
                TxOut {
                    value: Amount::from_sat(25_000),
                    script_pubkey: p2wpkh_script(seed as u8),
                },
                TxOut {
                    value: Amount::from_sat(70_000),
                    script_pubkey: p2pkh_script(seed as u8),
                },
            ],
        )
    }

    /// Coinbase for the block at `height`.
    pub fn coinbase(height: u32) -> Transaction {
        let mut script_sig = vec![0x04];
        script_sig.extend_from_slice(&height.to_le_bytes());

        transaction(
            vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::all_zeros(),
                    vout: u32::MAX,
                },
                script_sig: ScriptBuf::from_bytes(script_sig),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            vec![TxOut {
                value: Amount::from_sat(625_000_000),
                script_pubkey: p2wpkh_script(0xcb),
            }],
        )
    }

    /// Block linked to `prev` with the given transactions.
    pub fn block(prev: BlockHash, height: u32, txdata: Vec<Transaction>) -> Block {
        Block {
            header: Header {
                version: BlockVersion::ONE,
                prev_blockhash: prev,
                merkle_root: TxMerkleNode::all_zeros(),
                time: 1_546_300_800 + height * 600,
                bits: CompactTarget::from_consensus(0x207f_ffff),
                nonce: height,
            },
            txdata,
        }
    }

    fn seeded_txid(seed: u32) -> Txid {
        let mut bytes = [0xa5; 32];
        bytes[..4].copy_from_slice(&seed.to_le_bytes());
        Txid::from_byte_array(bytes)
    }

    fn witness_input(previous_output: OutPoint, witness: Witness) -> TxIn {
        TxIn {
            previous_output,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness,
        }
    }

    fn transaction(input: Vec<TxIn>, output: Vec<TxOut>) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chain_links_and_tip() {
        let ledger = ChainBuilder::new().empty_blocks(5).build();
        assert_eq!(ledger.block_count().await.unwrap(), 4);

        let tip = ledger.block(&ledger.hash_at(4).unwrap()).await.unwrap();
        assert_eq!(tip.header.prev_blockhash, ledger.hash_at(3).unwrap());

        let genesis = ledger.block(&ledger.hash_at(0).unwrap()).await.unwrap();
        assert_eq!(genesis.header.prev_blockhash, BlockHash::all_zeros());
    }

    #[tokio::test]
    async fn test_transactions_served() {
        let funding = fixtures::funding_tx(1, Amount::from_sat(1_000_000));
        let txid = funding.compute_txid();
        let ledger = ChainBuilder::new()
            .empty_blocks(1)
            .transaction(funding)
            .build();

        assert!(ledger.raw_transaction(&txid).await.is_ok());
        assert!(ledger
            .raw_transaction(&fixtures::funding_outpoint(9).txid)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_runtime_failure_injection() {
        let ledger = ChainBuilder::new().empty_blocks(3).build();
        let hash = ledger.hash_at(1).unwrap();
        assert!(ledger.block(&hash).await.is_ok());

        ledger.fail_block_at(1);
        assert!(ledger.block(&hash).await.is_err());
        assert_eq!(ledger.block_fetches(), 2);
    }

    #[tokio::test]
    async fn test_static_registry() {
        let public = fixtures::funding_outpoint(1);
        let registry = StaticRegistry::new().with(public);

        assert!(registry.is_known_public(&public).await);
        assert!(!registry.is_known_public(&fixtures::funding_outpoint(2)).await);
        assert_eq!(registry.lookups(), 2);
    }
}
