//! Estimator configuration.

use bitcoin::Amount;
use serde::{Deserialize, Serialize};

use crate::errors::{EstimateError, Result};
use crate::{
    DEFAULT_CAPACITY_CUTOFF_SAT, DEFAULT_KNOWN_PUBLIC_CHANNELS, DEFAULT_START_HEIGHT,
    DEFAULT_TRIALS, DEFAULT_WINDOW_SIZE,
};

/// How the per-trial ratio samples are reduced to one average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragingPolicy {
    /// Divide the sum of samples by the number of trials that produced one.
    #[default]
    SampledTrials,
    /// Divide the sum of samples by the configured trial count.
    ///
    /// Trials without a sample pull the average towards zero.
    FixedTrialCount,
}

/// Configuration for an estimation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of consecutive blocks walked per trial.
    pub window_size: u64,

    /// Number of independent trials.
    pub trials: usize,

    /// Earliest height a window may start from.
    pub start_height: u64,

    /// Largest funding capacity, in satoshis, still counted as a channel.
    pub capacity_cutoff_sat: u64,

    /// Currently known number of open public channels.
    pub known_public_channels: u64,

    /// Trials walked at the same time.
    pub max_concurrent_trials: usize,

    /// Transactions of one block classified at the same time.
    pub classify_concurrency: usize,

    /// Reduction of ratio samples into the final average.
    pub averaging: AveragingPolicy,

    /// Seed for the height sampler (random when absent).
    pub seed: Option<u64>,
}

impl EstimatorConfig {
    /// Create a configuration with the reference constants.
    pub fn new() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            trials: DEFAULT_TRIALS,
            start_height: DEFAULT_START_HEIGHT,
            capacity_cutoff_sat: DEFAULT_CAPACITY_CUTOFF_SAT,
            known_public_channels: DEFAULT_KNOWN_PUBLIC_CHANNELS,
            max_concurrent_trials: 4,
            classify_concurrency: 16,
            averaging: AveragingPolicy::default(),
            seed: None,
        }
    }

    /// Set the window size in blocks.
    pub fn with_window_size(mut self, blocks: u64) -> Self {
        self.window_size = blocks;
        self
    }

    /// Set the number of trials.
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Set the earliest eligible start height.
    pub fn with_start_height(mut self, height: u64) -> Self {
        self.start_height = height;
        self
    }

    /// Set the capacity cutoff.
    pub fn with_capacity_cutoff(mut self, cutoff: Amount) -> Self {
        self.capacity_cutoff_sat = cutoff.to_sat();
        self
    }

    /// Set the known public channel count.
    pub fn with_known_public_channels(mut self, count: u64) -> Self {
        self.known_public_channels = count;
        self
    }

    /// Set how many trials run at once.
    pub fn with_max_concurrent_trials(mut self, n: usize) -> Self {
        self.max_concurrent_trials = n;
        self
    }

    /// Set how many transactions per block are classified at once.
    pub fn with_classify_concurrency(mut self, n: usize) -> Self {
        self.classify_concurrency = n;
        self
    }

    /// Set the averaging policy.
    pub fn with_averaging(mut self, policy: AveragingPolicy) -> Self {
        self.averaging = policy;
        self
    }

    /// Set a fixed sampler seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Capacity cutoff as an amount.
    pub fn capacity_cutoff(&self) -> Amount {
        Amount::from_sat(self.capacity_cutoff_sat)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(EstimateError::Config("window size must be at least 1".into()));
        }

        if self.trials == 0 {
            return Err(EstimateError::Config("at least one trial is required".into()));
        }

        // Every eligible start height must leave room for a full window
        // above the genesis block.
        if self.start_height.saturating_add(1) < self.window_size {
            return Err(EstimateError::Config(format!(
                "start height {} cannot support a window of {} blocks",
                self.start_height, self.window_size
            )));
        }

        if self.max_concurrent_trials == 0 || self.classify_concurrency == 0 {
            return Err(EstimateError::Config(
                "concurrency limits must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_defaults() {
        let config = EstimatorConfig::default();
        assert_eq!(config.window_size, 4320);
        assert_eq!(config.trials, 10);
        assert_eq!(config.start_height, 560_000);
        assert_eq!(config.capacity_cutoff(), Amount::from_sat(50_000_000));
        assert_eq!(config.averaging, AveragingPolicy::SampledTrials);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = EstimatorConfig::new()
            .with_window_size(6)
            .with_trials(3)
            .with_start_height(10)
            .with_known_public_channels(1000)
            .with_averaging(AveragingPolicy::FixedTrialCount)
            .with_seed(7);

        assert_eq!(config.window_size, 6);
        assert_eq!(config.trials, 3);
        assert_eq!(config.seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_must_fit_above_genesis() {
        let config = EstimatorConfig::new().with_start_height(3).with_window_size(5);
        assert!(config.validate().is_err());

        let config = EstimatorConfig::new().with_start_height(4).with_window_size(5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(EstimatorConfig::new().with_trials(0).validate().is_err());
        assert!(EstimatorConfig::new().with_window_size(0).validate().is_err());
        assert!(EstimatorConfig::new()
            .with_max_concurrent_trials(0)
            .validate()
            .is_err());
    }
}
