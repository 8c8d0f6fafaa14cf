//! Script analysis used by the close classifier.
//!
//! Only the witness v0 subset needed to recognise a cooperative 2-of-2
//! spend is covered: recovering the spent output script from a witness,
//! classifying output scripts, counting signature operations and
//! comparing the witness stack with what the spent script expects.

use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::{
    OP_CHECKMULTISIG, OP_CHECKMULTISIGVERIFY, OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_PUSHNUM_1,
    OP_PUSHNUM_16,
};
use bitcoin::opcodes::Opcode;
use bitcoin::script::Instruction;
use bitcoin::{Script, ScriptBuf, WPubkeyHash, WScriptHash, Witness};

use crate::errors::{EstimateError, Result};

/// Length of a compressed public key.
const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Length of an uncompressed public key.
const UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// Sigops charged for a multisig whose key count is not a small integer.
const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Standard output script classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    /// Pay to witness script hash (v0).
    WitnessV0ScriptHash,
    /// Pay to witness public key hash (v0).
    WitnessV0PubKeyHash,
    /// Pay to taproot (witness v1).
    WitnessV1Taproot,
    /// Pay to script hash.
    ScriptHash,
    /// Pay to public key hash.
    PubKeyHash,
    /// Pay to public key.
    PubKey,
    /// Bare m-of-n multisig.
    MultiSig {
        /// Signatures required.
        required: usize,
        /// Keys listed.
        keys: usize,
    },
    /// Provably unspendable data carrier.
    NullData,
    /// Anything else.
    NonStandard,
}

impl ScriptClass {
    /// Classify a script.
    pub fn of(script: &Script) -> Self {
        if script.is_p2wsh() {
            ScriptClass::WitnessV0ScriptHash
        } else if script.is_p2wpkh() {
            ScriptClass::WitnessV0PubKeyHash
        } else if script.is_p2tr() {
            ScriptClass::WitnessV1Taproot
        } else if script.is_p2sh() {
            ScriptClass::ScriptHash
        } else if script.is_p2pkh() {
            ScriptClass::PubKeyHash
        } else if script.is_p2pk() {
            ScriptClass::PubKey
        } else if script.is_op_return() {
            ScriptClass::NullData
        } else if let Some((required, keys)) = multisig_shape(script) {
            ScriptClass::MultiSig { required, keys }
        } else {
            ScriptClass::NonStandard
        }
    }

    /// Whether this is a segwit v0 payout shape.
    pub fn is_witness_v0(&self) -> bool {
        matches!(
            self,
            ScriptClass::WitnessV0ScriptHash | ScriptClass::WitnessV0PubKeyHash
        )
    }

    /// Stack items a spend of this class must provide, if known.
    ///
    /// Bare multisig needs one extra item for the historical
    /// `OP_CHECKMULTISIG` off-by-one.
    pub fn expected_inputs(&self) -> Option<usize> {
        match *self {
            ScriptClass::PubKey => Some(1),
            ScriptClass::PubKeyHash | ScriptClass::WitnessV0PubKeyHash => Some(2),
            ScriptClass::ScriptHash | ScriptClass::WitnessV0ScriptHash => Some(1),
            ScriptClass::MultiSig { required, .. } => Some(required + 1),
            _ => None,
        }
    }
}

/// Structural comparison of a witness against the script it spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptInfo {
    /// Class of the spent output script.
    pub pk_script_class: ScriptClass,
    /// Stack items the spent script expects, if determinable.
    pub expected_inputs: Option<usize>,
    /// Stack items actually provided.
    pub num_inputs: usize,
    /// Signature operations executed by the spend.
    pub sig_ops: usize,
}

/// Recover the output script a witness-only input is spending.
///
/// A two item witness whose last element is a compressed key spends a
/// P2WPKH output; anything else is taken as a P2WSH spend whose witness
/// script is the last element.
pub fn spent_script_from_witness(script_sig: &Script, witness: &Witness) -> Result<ScriptBuf> {
    if !script_sig.is_empty() {
        return Err(EstimateError::Script(
            "input carries a legacy unlocking script".into(),
        ));
    }

    let last = witness
        .last()
        .ok_or_else(|| EstimateError::Script("empty witness".into()))?;

    if witness.len() == 2 && last.len() == COMPRESSED_PUBKEY_LEN {
        return Ok(ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(last)));
    }

    Ok(ScriptBuf::new_p2wsh(&WScriptHash::hash(last)))
}

/// Signature operations of a witness spend of `pk_script`.
pub fn witness_sigop_count(pk_script: &Script, witness: &Witness) -> Result<usize> {
    match ScriptClass::of(pk_script) {
        ScriptClass::WitnessV0PubKeyHash => Ok(1),
        ScriptClass::WitnessV0ScriptHash => match witness.last() {
            Some(witness_script) => sigop_count(Script::from_bytes(witness_script)),
            None => Ok(0),
        },
        _ => Ok(0),
    }
}

/// Compare the witness stack with what `pk_script` demands.
pub fn witness_script_info(pk_script: &Script, witness: &Witness) -> Result<ScriptInfo> {
    let pk_script_class = ScriptClass::of(pk_script);
    let mut expected_inputs = pk_script_class.expected_inputs();

    if pk_script_class == ScriptClass::WitnessV0ScriptHash {
        let witness_script = witness
            .last()
            .ok_or_else(|| EstimateError::Script("empty witness".into()))?;
        let inner = ScriptClass::of(Script::from_bytes(witness_script)).expected_inputs();
        expected_inputs = match (expected_inputs, inner) {
            (Some(outer), Some(inner)) => Some(outer + inner),
            _ => None,
        };
    }

    Ok(ScriptInfo {
        pk_script_class,
        expected_inputs,
        num_inputs: witness.len(),
        sig_ops: witness_sigop_count(pk_script, witness)?,
    })
}

/// Accurate signature operation count of a script.
///
/// `OP_CHECKMULTISIG` preceded by a small integer counts that many
/// operations; otherwise it is charged the multisig maximum.
pub fn sigop_count(script: &Script) -> Result<usize> {
    let mut count = 0;
    let mut prev: Option<Opcode> = None;

    for instruction in script.instructions() {
        match instruction? {
            Instruction::Op(op) => {
                if op == OP_CHECKSIG || op == OP_CHECKSIGVERIFY {
                    count += 1;
                } else if op == OP_CHECKMULTISIG || op == OP_CHECKMULTISIGVERIFY {
                    count += prev
                        .and_then(small_int)
                        .unwrap_or(MAX_PUBKEYS_PER_MULTISIG);
                }
                prev = Some(op);
            }
            Instruction::PushBytes(_) => prev = None,
        }
    }

    Ok(count)
}

/// `(required, keys)` if the script is a bare m-of-n multisig.
pub fn multisig_shape(script: &Script) -> Option<(usize, usize)> {
    let instructions: Vec<Instruction<'_>> =
        script.instructions().collect::<std::result::Result<_, _>>().ok()?;

    let (first, rest) = instructions.split_first()?;
    let (last, middle) = rest.split_last()?;
    let (count_op, keys) = middle.split_last()?;

    let required = op_small_int(first)?;
    let total = op_small_int(count_op)?;
    if !matches!(last, Instruction::Op(op) if *op == OP_CHECKMULTISIG) {
        return None;
    }

    if required == 0 || total < required || keys.len() != total {
        return None;
    }

    let all_keys = keys.iter().all(|item| match item {
        Instruction::PushBytes(bytes) => {
            bytes.len() == COMPRESSED_PUBKEY_LEN || bytes.len() == UNCOMPRESSED_PUBKEY_LEN
        }
        Instruction::Op(_) => false,
    });

    all_keys.then_some((required, total))
}

fn op_small_int(instruction: &Instruction<'_>) -> Option<usize> {
    match instruction {
        Instruction::Op(op) => small_int(*op),
        Instruction::PushBytes(_) => None,
    }
}

fn small_int(op: Opcode) -> Option<usize> {
    let code = op.to_u8();
    if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&code) {
        Some((code - OP_PUSHNUM_1.to_u8() + 1) as usize)
    } else {
        None
    }
}
