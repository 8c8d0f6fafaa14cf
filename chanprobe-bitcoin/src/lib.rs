//! Bitcoin Core ledger client for chanprobe.
//!
//! Implements [`chanprobe_core::LedgerClient`] on top of a Bitcoin Core
//! node's JSON-RPC interface. Funding output lookups use
//! `getrawtransaction`, so the node should run with `txindex=1`.
//!
//! # Example
//!
//! ```ignore
//! use chanprobe_bitcoin::{BitcoinConfig, BitcoinLedger};
//!
//! let config = BitcoinConfig::mainnet("http://127.0.0.1:8332")
//!     .with_auth("user", "password");
//!
//! // Fails unless the node answers on mainnet
//! let ledger = BitcoinLedger::connect(config).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod error;
mod ledger;
mod rpc;

pub use config::{BitcoinConfig, Network};
pub use error::{BitcoinError, Result};
pub use ledger::BitcoinLedger;
pub use rpc::BitcoinRpc;
