//! Estimation run: trials, classification, registry lookups, reduction.
//!
//! Each trial walks its own window and keeps its own tally; trials only
//! meet in the [`RatioAggregator`] once they have fully completed. A fatal
//! ledger error stops the run and drops every trial still in flight, so no
//! partial tally is ever averaged.

use std::sync::Arc;

use bitcoin::{Amount, Block, Transaction};
use futures::stream::{self, StreamExt};
use rand::Rng;
use tracing::{debug, info};

use crate::aggregate::{RatioAggregator, TrialTally};
use crate::classifier::{ChannelClose, TransactionClassifier};
use crate::config::EstimatorConfig;
use crate::errors::{EstimateError, Result};
use crate::ledger::{LedgerClient, LedgerOutputs, PriorOutputSource};
use crate::registry::RegistryOracle;
use crate::sampler::{BlockWindow, BlockWindowSampler};

/// Result of an estimation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Trials planned.
    pub trials: usize,
    /// Trials that produced a ratio sample.
    pub ratio_samples: usize,
    /// Average private to public ratio, if any trial produced a sample.
    pub average_ratio: Option<f64>,
    /// Known public channel count the ratio was scaled by.
    pub known_public_channels: u64,
    /// Estimated number of private channels, if the ratio is defined.
    pub private_channels: Option<u64>,
    /// Mean capacity of registry-confirmed closes.
    pub mean_public_capacity: Option<Amount>,
    /// Tallies of the completed trials, in completion order.
    pub tallies: Vec<TrialTally>,
}

impl Estimate {
    fn from_aggregator(
        aggregator: &RatioAggregator,
        trials: usize,
        known_public_channels: u64,
        tallies: Vec<TrialTally>,
    ) -> Self {
        let average_ratio = aggregator.average_ratio();
        let private_channels =
            average_ratio.map(|ratio| (known_public_channels as f64 * ratio).floor() as u64);

        Self {
            trials,
            ratio_samples: aggregator.samples().len(),
            average_ratio,
            known_public_channels,
            private_channels,
            mean_public_capacity: aggregator.mean_public_capacity(),
            tallies,
        }
    }
}

/// Runs sampling trials against a ledger and a registry.
pub struct Estimator<L: ?Sized, O: ?Sized> {
    config: EstimatorConfig,
    ledger: Arc<L>,
    registry: Arc<O>,
    sampler: BlockWindowSampler<L>,
    classifier: TransactionClassifier,
}

impl<L, O> Estimator<L, O>
where
    L: LedgerClient + ?Sized,
    O: RegistryOracle + ?Sized,
{
    /// Create an estimator. Fails on an invalid configuration.
    pub fn new(config: EstimatorConfig, ledger: Arc<L>, registry: Arc<O>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            classifier: TransactionClassifier::new(config.capacity_cutoff()),
            sampler: BlockWindowSampler::new(Arc::clone(&ledger)),
            config,
            ledger,
            registry,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Run every trial and reduce them into an estimate.
    ///
    /// Window start heights are all drawn from `rng` before any trial
    /// starts, so a seeded generator reproduces the run regardless of the
    /// order trials finish in.
    pub async fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Estimate> {
        let best_height = self.ledger.block_count().await?;
        info!(best_height, "Best height");

        let windows = self.draw_windows(rng, best_height)?;
        let mut aggregator = RatioAggregator::new(self.config.averaging, self.config.trials);
        let mut tallies = Vec::with_capacity(self.config.trials);

        let mut trials = stream::iter(windows.into_iter().enumerate())
            .map(|(trial, window)| self.run_trial(trial, window))
            .buffer_unordered(self.config.max_concurrent_trials);

        while let Some(outcome) = trials.next().await {
            let tally = outcome?;
            aggregator.record(&tally);
            tallies.push(tally);
        }

        let estimate = Estimate::from_aggregator(
            &aggregator,
            self.config.trials,
            self.config.known_public_channels,
            tallies,
        );

        info!(
            samples = estimate.ratio_samples,
            trials = estimate.trials,
            average_ratio = ?estimate.average_ratio,
            private_channels = ?estimate.private_channels,
            "Estimation complete"
        );

        Ok(estimate)
    }

    /// Draw one window per trial.
    fn draw_windows<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        best_height: u64,
    ) -> Result<Vec<BlockWindow<L>>> {
        if best_height <= self.config.start_height {
            return Err(EstimateError::InvalidWindow(format!(
                "best height {} is not above start height {}",
                best_height, self.config.start_height
            )));
        }

        (0..self.config.trials)
            .map(|_| {
                self.sampler.sample(
                    rng,
                    self.config.start_height,
                    best_height,
                    self.config.window_size,
                )
            })
            .collect()
    }

    /// Walk one window to completion.
    pub async fn run_trial(&self, trial: usize, mut window: BlockWindow<L>) -> Result<TrialTally> {
        let height = window.start_height();
        info!(trial, height, "Starting trial");

        let mut tally = TrialTally::new(height);
        let mut walked = 0u64;

        while let Some(block) = window.next_block().await? {
            let partial = self.tally_block(&block).await;
            tally.merge(&partial);
            walked += 1;

            debug!(
                trial,
                block = walked,
                public = tally.public_closes,
                total = tally.total_closes,
                "Walked block"
            );
        }

        info!(
            trial,
            height,
            private = tally.private_closes(),
            public = tally.public_closes,
            ratio = ?tally.ratio(),
            "Trial complete"
        );

        Ok(tally)
    }

    /// Classify every transaction of a block and look flagged ones up.
    pub async fn tally_block(&self, block: &Block) -> TrialTally {
        let outputs = LedgerOutputs(self.ledger.as_ref());
        let mut partial = TrialTally::default();

        let mut closes = stream::iter(block.txdata.iter())
            .map(|tx| self.assess(tx, &outputs))
            .buffer_unordered(self.config.classify_concurrency);

        while let Some(close) = closes.next().await {
            if let Some((capacity, is_public)) = close {
                partial.record_close(capacity, is_public);
            }
        }

        partial
    }

    /// Classify one transaction; for a close, ask the registry about it.
    async fn assess<S>(&self, tx: &Transaction, outputs: &S) -> Option<(Amount, bool)>
    where
        S: PriorOutputSource + ?Sized,
    {
        let ChannelClose { funding, capacity } = self.classifier.detect(tx, outputs).await?;

        let is_public = self.registry.is_known_public(&funding).await;
        debug!(%funding, %capacity, is_public, "Likely channel close");

        Some((capacity, is_public))
    }
}
