//! Per-trial tallies and their reduction into an average ratio.

use bitcoin::Amount;

use crate::config::AveragingPolicy;

/// Counts gathered while walking one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialTally {
    /// Height the window started from.
    pub sampled_height: u64,
    /// Transactions classified as likely closes.
    pub total_closes: u64,
    /// Likely closes confirmed public by the registry.
    pub public_closes: u64,
    /// Summed capacity of the public closes.
    pub public_capacity: Amount,
}

impl TrialTally {
    /// Empty tally for a window starting at `sampled_height`.
    pub fn new(sampled_height: u64) -> Self {
        Self {
            sampled_height,
            total_closes: 0,
            public_closes: 0,
            public_capacity: Amount::ZERO,
        }
    }

    /// Count one likely close.
    pub fn record_close(&mut self, capacity: Amount, is_public: bool) {
        self.total_closes += 1;
        if is_public {
            self.public_closes += 1;
            self.public_capacity = saturating_add(self.public_capacity, capacity);
        }
    }

    /// Fold another partial tally of the same window into this one.
    pub fn merge(&mut self, other: &TrialTally) {
        self.total_closes += other.total_closes;
        self.public_closes += other.public_closes;
        self.public_capacity = saturating_add(self.public_capacity, other.public_capacity);
    }

    /// Likely closes not confirmed public.
    pub fn private_closes(&self) -> u64 {
        self.total_closes - self.public_closes
    }

    /// Private to public close ratio, undefined without public closes.
    pub fn ratio(&self) -> Option<f64> {
        if self.public_closes == 0 {
            return None;
        }
        Some(self.private_closes() as f64 / self.public_closes as f64)
    }
}

impl Default for TrialTally {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Collects completed trials and reduces their ratios.
///
/// Only fully walked trials may be recorded; a trial aborted half way
/// never reaches the aggregator.
#[derive(Debug, Clone)]
pub struct RatioAggregator {
    policy: AveragingPolicy,
    planned_trials: usize,
    samples: Vec<f64>,
    completed: usize,
    public_closes: u64,
    public_capacity: Amount,
}

impl RatioAggregator {
    /// Create an aggregator for `planned_trials` trials.
    pub fn new(policy: AveragingPolicy, planned_trials: usize) -> Self {
        Self {
            policy,
            planned_trials,
            samples: Vec::with_capacity(planned_trials),
            completed: 0,
            public_closes: 0,
            public_capacity: Amount::ZERO,
        }
    }

    /// Record a completed trial, returning its ratio sample if it has one.
    pub fn record(&mut self, tally: &TrialTally) -> Option<f64> {
        self.completed += 1;
        self.public_closes += tally.public_closes;
        self.public_capacity = saturating_add(self.public_capacity, tally.public_capacity);

        let ratio = tally.ratio()?;
        self.samples.push(ratio);
        Some(ratio)
    }

    /// Ratio samples recorded so far.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Number of completed trials.
    pub fn completed_trials(&self) -> usize {
        self.completed
    }

    /// Averaging policy in use.
    pub fn policy(&self) -> AveragingPolicy {
        self.policy
    }

    /// Average private to public ratio, `None` without any sample.
    pub fn average_ratio(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }

        let sum: f64 = self.samples.iter().sum();
        let divisor = match self.policy {
            AveragingPolicy::SampledTrials => self.samples.len(),
            AveragingPolicy::FixedTrialCount => self.planned_trials.max(1),
        };
        Some(sum / divisor as f64)
    }

    /// Mean capacity of the public closes seen across completed trials.
    pub fn mean_public_capacity(&self) -> Option<Amount> {
        if self.public_closes == 0 {
            return None;
        }
        Some(Amount::from_sat(
            self.public_capacity.to_sat() / self.public_closes,
        ))
    }
}

fn saturating_add(a: Amount, b: Amount) -> Amount {
    Amount::from_sat(a.to_sat().saturating_add(b.to_sat()))
}
