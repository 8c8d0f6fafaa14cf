//! Sampling estimator for unannounced Lightning channels.
//!
//! Private channels never appear in the public graph, but they still close
//! on-chain. This crate samples windows of Bitcoin history, picks out
//! transactions shaped like cooperative channel closes, and asks a public
//! channel registry which of them it knows. The private to public close
//! ratio, averaged over several windows and scaled by the number of known
//! public channels, estimates how many private channels are open.
//!
//! # How It Works
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      ESTIMATION PIPELINE                            │
//! │                                                                     │
//! │  Estimator ── N trials, bounded parallelism                         │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  BlockWindowSampler ── random height, walk back window_size blocks  │
//! │     │ (per block)                                                   │
//! │     ▼                                                               │
//! │  TransactionClassifier ── 1 input, 2-of-2 P2WSH witness,            │
//! │     │                     segwit payouts, capacity <= cutoff        │
//! │     ▼ (per close)                                                   │
//! │  RegistryOracle ── is the funding outpoint a public channel?        │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  RatioAggregator ── (total - public) / public per trial, averaged   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chanprobe_core::{Estimator, EstimatorConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let estimator = Estimator::new(EstimatorConfig::default(), ledger, registry)?;
//! let estimate = estimator.run(&mut StdRng::seed_from_u64(42)).await?;
//!
//! if let Some(count) = estimate.private_channels {
//!     println!("{}", count);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod estimator;
pub mod ledger;
pub mod registry;
pub mod sampler;
pub mod script;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod proptest;

pub use aggregate::{RatioAggregator, TrialTally};
pub use classifier::{ChannelClose, ClassificationResult, Rejection, TransactionClassifier};
pub use config::{AveragingPolicy, EstimatorConfig};
pub use errors::{EstimateError, Result};
pub use estimator::{Estimate, Estimator};
pub use ledger::{LedgerClient, LedgerOutputs, PriorOutputSource};
pub use registry::RegistryOracle;
pub use sampler::{BlockWindow, BlockWindowSampler};
pub use script::{ScriptClass, ScriptInfo};

#[cfg(any(test, feature = "mock"))]
pub use mock::{ChainBuilder, MockLedger, StaticOutputs, StaticRegistry};

/// Blocks per trial window, about one month of blocks.
pub const DEFAULT_WINDOW_SIZE: u64 = 4320;

/// Trials per run.
pub const DEFAULT_TRIALS: usize = 10;

/// Earliest window start; mined January 2019, once Lightning saw real use.
pub const DEFAULT_START_HEIGHT: u64 = 560_000;

/// Channels above 0.5 BTC are rare enough to distort the ratio.
pub const DEFAULT_CAPACITY_CUTOFF_SAT: u64 = 50_000_000;

/// Public channel count as last read from a public explorer.
pub const DEFAULT_KNOWN_PUBLIC_CHANNELS: u64 = 82_182;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, TransactionClassifier};
    pub use crate::config::{AveragingPolicy, EstimatorConfig};
    pub use crate::errors::{EstimateError, Result};
    pub use crate::estimator::{Estimate, Estimator};
    pub use crate::ledger::LedgerClient;
    pub use crate::registry::RegistryOracle;

    #[cfg(any(test, feature = "mock"))]
    pub use crate::mock::{ChainBuilder, MockLedger, StaticRegistry};
}
