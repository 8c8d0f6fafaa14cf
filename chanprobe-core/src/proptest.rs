//! Property-based tests for the classifier and the ratio reduction.

use bitcoin::{Amount, Transaction};
use futures::executor::block_on;
use proptest::prelude::*;

use crate::aggregate::{RatioAggregator, TrialTally};
use crate::classifier::{ClassificationResult, TransactionClassifier};
use crate::config::AveragingPolicy;
use crate::mock::{fixtures, StaticOutputs};

const CUTOFF: u64 = crate::DEFAULT_CAPACITY_CUTOFF_SAT;

// ============================================================================
// Strategies
// ============================================================================

/// A cooperative close and an output source resolving its funding output.
fn arb_close(
    capacity: impl Strategy<Value = u64>,
) -> impl Strategy<Value = (Transaction, StaticOutputs, u64)> {
    (any::<u32>(), any::<u8>(), capacity).prop_map(|(funding_seed, seed, capacity)| {
        let funding = fixtures::funding_outpoint(funding_seed);
        let tx = fixtures::cooperative_close(funding, seed);
        let outputs = StaticOutputs::new().with(funding, Amount::from_sat(capacity));
        (tx, outputs, capacity)
    })
}

/// `(total, public)` close counts with `public <= total`.
fn arb_counts() -> impl Strategy<Value = (u64, u64)> {
    (0u64..200).prop_flat_map(|total| (Just(total), 0..=total))
}

fn tally_of(total: u64, public: u64) -> TrialTally {
    let mut tally = TrialTally::new(600_000);
    for i in 0..total {
        tally.record_close(Amount::from_sat(1_000), i < public);
    }
    tally
}

// ============================================================================
// Property Tests: Classifier
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any close shape within the cutoff is flagged with the funding value.
    #[test]
    fn prop_close_within_cutoff_flagged((tx, outputs, capacity) in arb_close(0..=CUTOFF)) {
        let result = block_on(TransactionClassifier::default().classify(&tx, &outputs));
        prop_assert_eq!(result, ClassificationResult::close(Amount::from_sat(capacity)));
    }

    /// Capacity above the cutoff is never a close, whatever the shape.
    #[test]
    fn prop_capacity_above_cutoff_rejected(
        (tx, outputs, _) in arb_close((CUTOFF + 1)..=21_000_000 * 100_000_000),
    ) {
        let result = block_on(TransactionClassifier::default().classify(&tx, &outputs));
        prop_assert_eq!(result, ClassificationResult::NOT_CLOSE);
    }

    /// More than one input is never a close.
    #[test]
    fn prop_multiple_inputs_rejected(
        (mut tx, outputs, _) in arb_close(0..=CUTOFF),
        extra in 1usize..5,
    ) {
        for _ in 0..extra {
            tx.input.push(tx.input[0].clone());
        }
        let result = block_on(TransactionClassifier::default().classify(&tx, &outputs));
        prop_assert!(!result.is_likely_close);
    }

    /// Same transaction and same lookup answer give the same result.
    #[test]
    fn prop_classification_deterministic((tx, outputs, _) in arb_close(0..=2 * CUTOFF)) {
        let classifier = TransactionClassifier::default();
        let first = block_on(classifier.classify(&tx, &outputs));
        let second = block_on(classifier.classify(&tx, &outputs));
        prop_assert_eq!(first, second);
    }

    /// Capacity is only ever reported for a close.
    #[test]
    fn prop_capacity_implies_close((tx, outputs, _) in arb_close(0..=2 * CUTOFF)) {
        let result = block_on(TransactionClassifier::default().classify(&tx, &outputs));
        prop_assert!(result.capacity == Amount::ZERO || result.is_likely_close);
    }
}

// ============================================================================
// Property Tests: Aggregation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A trial without public closes never yields a sample.
    #[test]
    fn prop_zero_public_no_sample(total in 0u64..500) {
        let mut agg = RatioAggregator::new(AveragingPolicy::SampledTrials, 1);
        prop_assert_eq!(agg.record(&tally_of(total, 0)), None);
        prop_assert!(agg.samples().is_empty());
        prop_assert_eq!(agg.average_ratio(), None);
    }

    /// Public closes never exceed total closes and the ratio is non-negative.
    #[test]
    fn prop_ratio_non_negative((total, public) in arb_counts()) {
        let tally = tally_of(total, public);
        prop_assert!(tally.public_closes <= tally.total_closes);
        if let Some(ratio) = tally.ratio() {
            prop_assert!(ratio >= 0.0);
        }
    }

    /// Dividing by the planned trial count never exceeds the sampled mean.
    #[test]
    fn prop_fixed_count_not_above_sampled(counts in prop::collection::vec(arb_counts(), 1..10)) {
        let mut sampled = RatioAggregator::new(AveragingPolicy::SampledTrials, counts.len());
        let mut fixed = RatioAggregator::new(AveragingPolicy::FixedTrialCount, counts.len());
        for (total, public) in &counts {
            let tally = tally_of(*total, *public);
            sampled.record(&tally);
            fixed.record(&tally);
        }

        match (sampled.average_ratio(), fixed.average_ratio()) {
            (Some(s), Some(f)) => prop_assert!(f <= s + 1e-9),
            (None, None) => {}
            other => prop_assert!(false, "policies disagree on definedness: {:?}", other),
        }
    }
}
