//! Transactions under composition and their conservative size/fee estimate.

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use serde::{Deserialize, Serialize};

/// txid, vout and sequence of a serialized input.
const INPUT_BASE_SIZE: usize = 40;
const P2PKH_SCRIPT_SIG_SIZE: usize = 107;
/// Roughly a P2SH 2-of-3 redemption.
const MULTISIG_SCRIPT_SIG_SIZE: usize = 254;
const P2PKH_SCRIPT_PUBKEY_SIZE: usize = 25;
/// Output value field.
const OUTPUT_VALUE_SIZE: usize = 8;
/// Version plus lock time.
const TX_OVERHEAD_SIZE: usize = 8;

pub const DEFAULT_FEE_PER_KB: u64 = 10_000;

/// Serialized size of a Bitcoin compact-size integer.
pub fn var_int_size(n: usize) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn p2pkh_input_size() -> usize {
    INPUT_BASE_SIZE + var_int_size(P2PKH_SCRIPT_SIG_SIZE) + P2PKH_SCRIPT_SIG_SIZE
}

fn multisig_input_size() -> usize {
    INPUT_BASE_SIZE + var_int_size(MULTISIG_SCRIPT_SIG_SIZE) + MULTISIG_SCRIPT_SIG_SIZE
}

fn output_size(script_len: usize) -> usize {
    OUTPUT_VALUE_SIZE + var_int_size(script_len) + script_len
}

/// Room reserved for parts of the transaction not chosen yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraSize {
    pub inputs: usize,
    pub outputs: usize,
    pub bytes: usize,
}

impl ExtraSize {
    pub fn none() -> Self {
        Self {
            inputs: 0,
            outputs: 0,
            bytes: 0,
        }
    }
}

impl Default for ExtraSize {
    /// One change output.
    fn default() -> Self {
        Self {
            inputs: 0,
            outputs: 1,
            bytes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub outpoint: OutPoint,
    /// Script of the output being spent.
    pub script_pubkey: ScriptBuf,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub script_pubkey: ScriptBuf,
    pub value: u64,
}

/// Fee rate applied to estimated sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePolicy {
    pub fee_per_kb: u64,
}

impl FeePolicy {
    pub fn new(fee_per_kb: u64) -> Self {
        Self { fee_per_kb }
    }

    /// Fee for `size` bytes, charged per started kilobyte.
    pub fn fee_for_size(&self, size: usize) -> u64 {
        (size as u64).div_ceil(1000).saturating_mul(self.fee_per_kb)
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FEE_PER_KB)
    }
}

/// A transaction whose inputs and outputs are decided but not yet signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedTx {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

impl ComposedTx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&mut self, input: TxInput) -> &mut Self {
        self.inputs.push(input);
        self
    }

    pub fn add_output(&mut self, output: TxOutput) -> &mut Self {
        self.outputs.push(output);
        self
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    /// Saturates at `u64::MAX`.
    pub fn input_value(&self) -> u64 {
        self.inputs
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.value))
    }

    /// Saturates at `u64::MAX`.
    pub fn output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, o| acc.saturating_add(o.value))
    }

    /// Over-estimate of the serialized size once signed.
    ///
    /// Inputs spending a P2PKH-sized script are costed as P2PKH spends;
    /// everything else, including `extra.inputs`, as multisig spends.
    pub fn estimate_size(&self, extra: ExtraSize) -> usize {
        let input_bytes: usize = self
            .inputs
            .iter()
            .map(|i| {
                if i.script_pubkey.len() == P2PKH_SCRIPT_PUBKEY_SIZE {
                    p2pkh_input_size()
                } else {
                    multisig_input_size()
                }
            })
            .sum::<usize>()
            + multisig_input_size() * extra.inputs;

        let output_bytes: usize = self
            .outputs
            .iter()
            .map(|o| output_size(o.script_pubkey.len()))
            .sum::<usize>()
            + output_size(P2PKH_SCRIPT_PUBKEY_SIZE) * extra.outputs;

        TX_OVERHEAD_SIZE
            + extra.bytes
            + var_int_size(self.inputs.len() + extra.inputs)
            + var_int_size(self.outputs.len() + extra.outputs)
            + input_bytes
            + output_bytes
    }

    pub fn estimate_required_fee(&self, policy: &FeePolicy, extra: ExtraSize) -> u64 {
        policy.fee_for_size(self.estimate_size(extra))
    }

    /// The transaction with empty script sigs, ready for a signer.
    pub fn unsigned_transaction(&self) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: self
                .inputs
                .iter()
                .map(|i| TxIn {
                    previous_output: i.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: self
                .outputs
                .iter()
                .map(|o| TxOut {
                    value: Amount::from_sat(o.value),
                    script_pubkey: o.script_pubkey.clone(),
                })
                .collect(),
        }
    }
}
