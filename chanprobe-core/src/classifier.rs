//! Heuristic detection of Lightning channel closing transactions.
//!
//! A cooperative close spends the channel's 2-of-2 P2WSH funding output
//! with a witness of `[<empty>, <sig>, <sig>, <witness script>]` and pays
//! out to at most two segwit outputs. Private and public channels close
//! the same way, so the same rules catch both. The rules run in order and
//! the first one that fails decides the [`Rejection`].

use std::fmt;

use bitcoin::{Amount, OutPoint, Transaction};
use tracing::debug;

use crate::errors::EstimateError;
use crate::ledger::PriorOutputSource;
use crate::script::{self, ScriptClass};

/// Outcome of classifying one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Whether the transaction looks like a channel close.
    pub is_likely_close: bool,
    /// Capacity of the closed channel; zero unless `is_likely_close`.
    pub capacity: Amount,
}

impl ClassificationResult {
    /// A transaction that is not a close.
    pub const NOT_CLOSE: Self = Self {
        is_likely_close: false,
        capacity: Amount::ZERO,
    };

    /// A close of a channel with the given capacity.
    pub fn close(capacity: Amount) -> Self {
        Self {
            is_likely_close: true,
            capacity,
        }
    }
}

/// A transaction accepted as a likely channel close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClose {
    /// Funding output spent by the close.
    pub funding: OutPoint,
    /// Value of the funding output.
    pub capacity: Amount,
}

/// First rule a transaction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not exactly one input, or more than two outputs.
    Shape {
        /// Input count.
        inputs: usize,
        /// Output count.
        outputs: usize,
    },
    /// Input has a legacy unlocking script or no witness.
    NotWitnessSpend,
    /// Spent script is not P2WSH.
    NotScriptHash(ScriptClass),
    /// Witness does not execute exactly two signature checks.
    SigOps(usize),
    /// Witness stack is not the 2-of-2 shape.
    StackItems {
        /// Items the spent script expects.
        expected: Option<usize>,
        /// Items provided.
        actual: usize,
    },
    /// An output pays to a non segwit v0 script.
    Payout(ScriptClass),
    /// Funding output above the capacity cutoff.
    Capacity(Amount),
    /// Script analysis failed.
    Script(String),
    /// Funding output could not be resolved.
    PriorOutput(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Shape { inputs, outputs } => {
                write!(f, "{} inputs and {} outputs", inputs, outputs)
            }
            Rejection::NotWitnessSpend => write!(f, "not a pure witness spend"),
            Rejection::NotScriptHash(class) => write!(f, "spends {:?}", class),
            Rejection::SigOps(n) => write!(f, "{} witness sigops", n),
            Rejection::StackItems { expected, actual } => {
                write!(f, "stack items expected {:?}, actual {}", expected, actual)
            }
            Rejection::Payout(class) => write!(f, "pays to {:?}", class),
            Rejection::Capacity(amount) => write!(f, "capacity {} above cutoff", amount),
            Rejection::Script(e) => write!(f, "script error: {}", e),
            Rejection::PriorOutput(e) => write!(f, "funding output unavailable: {}", e),
        }
    }
}

impl From<EstimateError> for Rejection {
    fn from(e: EstimateError) -> Self {
        match e {
            EstimateError::Script(msg) => Rejection::Script(msg),
            other => Rejection::PriorOutput(other.to_string()),
        }
    }
}

/// Applies the close heuristic to transactions.
#[derive(Debug, Clone, Copy)]
pub struct TransactionClassifier {
    capacity_cutoff: Amount,
}

impl TransactionClassifier {
    /// Create a classifier with the given capacity cutoff.
    pub fn new(capacity_cutoff: Amount) -> Self {
        Self { capacity_cutoff }
    }

    /// Largest capacity still accepted.
    pub fn capacity_cutoff(&self) -> Amount {
        self.capacity_cutoff
    }

    /// Classify `tx`, resolving its funding output through `prior`.
    pub async fn classify<S>(&self, tx: &Transaction, prior: &S) -> ClassificationResult
    where
        S: PriorOutputSource + ?Sized,
    {
        match self.detect(tx, prior).await {
            Some(close) => ClassificationResult::close(close.capacity),
            None => ClassificationResult::NOT_CLOSE,
        }
    }

    /// The close `tx` represents, if any.
    ///
    /// Script and funding lookup failures are logged and read as "not a
    /// close".
    pub async fn detect<S>(&self, tx: &Transaction, prior: &S) -> Option<ChannelClose>
    where
        S: PriorOutputSource + ?Sized,
    {
        match self.evaluate(tx, prior).await {
            Ok(close) => Some(close),
            Err(rejection) => {
                if matches!(
                    rejection,
                    Rejection::Script(_) | Rejection::PriorOutput(_)
                ) {
                    debug!(txid = %tx.compute_txid(), %rejection, "Classification failed");
                }
                None
            }
        }
    }

    /// Run every rule and report the close or the first failing rule.
    pub async fn evaluate<S>(
        &self,
        tx: &Transaction,
        prior: &S,
    ) -> std::result::Result<ChannelClose, Rejection>
    where
        S: PriorOutputSource + ?Sized,
    {
        let funding = self.inspect(tx)?;
        let capacity = prior.prior_output_value(&funding).await?;
        self.check_capacity(capacity)?;

        Ok(ChannelClose { funding, capacity })
    }

    /// Structural rules that need no ledger access.
    ///
    /// Returns the funding outpoint the transaction spends.
    pub fn inspect(&self, tx: &Transaction) -> std::result::Result<OutPoint, Rejection> {
        if tx.input.len() != 1 || tx.output.len() > 2 {
            return Err(Rejection::Shape {
                inputs: tx.input.len(),
                outputs: tx.output.len(),
            });
        }

        let input = &tx.input[0];
        if !input.script_sig.is_empty() || input.witness.is_empty() {
            return Err(Rejection::NotWitnessSpend);
        }

        let pk_script = script::spent_script_from_witness(&input.script_sig, &input.witness)?;
        let class = ScriptClass::of(&pk_script);
        if class != ScriptClass::WitnessV0ScriptHash {
            return Err(Rejection::NotScriptHash(class));
        }

        let info = script::witness_script_info(&pk_script, &input.witness)?;
        if info.sig_ops != 2 {
            return Err(Rejection::SigOps(info.sig_ops));
        }

        if info.expected_inputs != Some(4) || info.num_inputs != 4 {
            return Err(Rejection::StackItems {
                expected: info.expected_inputs,
                actual: info.num_inputs,
            });
        }

        for output in &tx.output {
            let class = ScriptClass::of(&output.script_pubkey);
            if !class.is_witness_v0() {
                return Err(Rejection::Payout(class));
            }
        }

        Ok(input.previous_output)
    }

    /// Capacity rule.
    pub fn check_capacity(&self, capacity: Amount) -> std::result::Result<Amount, Rejection> {
        if capacity > self.capacity_cutoff {
            return Err(Rejection::Capacity(capacity));
        }
        Ok(capacity)
    }
}

impl Default for TransactionClassifier {
    fn default() -> Self {
        Self::new(Amount::from_sat(crate::DEFAULT_CAPACITY_CUTOFF_SAT))
    }
}
