//! Structural transaction rules and the reader/writer capabilities

use crate::crypto::check_key;
use crate::error::{Result, ValidationError};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ring member offered to the builder: global index and one-time key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalOutput {
    pub output_index: u32,
    pub target_key: PublicKey,
}

/// Output actually being spent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealOutput {
    /// Public key of the transaction that created the output
    pub transaction_public_key: PublicKey,
    /// Position of the real output inside `InputKeyInfo::outputs`
    pub transaction_index: usize,
    /// Position of the output inside its creating transaction
    pub output_in_transaction: usize,
}

/// Everything needed to add and sign one key input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputKeyInfo {
    pub amount: u64,
    pub outputs: Vec<GlobalOutput>,
    pub real_output: RealOutput,
}

/// Read access to a transaction and its derived values
pub trait TransactionReader {
    fn transaction_hash(&self) -> Hash;
    fn transaction_prefix_hash(&self) -> Hash;
    fn transaction_public_key(&self) -> Option<PublicKey>;
    fn unlock_time(&self) -> u64;
    fn payment_id(&self) -> Option<PaymentId>;
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn input_total_amount(&self) -> std::result::Result<u64, ValidationError>;
    fn output_total_amount(&self) -> std::result::Result<u64, ValidationError>;
    fn key_images(&self) -> Vec<KeyImage>;
    /// Binary form of the whole transaction
    fn transaction_data(&self) -> Vec<u8>;
}

/// Mutation and signing of a transaction under construction
///
/// Every mutator fails with `ConsensusError::TransactionAlreadySigned` once a
/// signature has been committed.
pub trait TransactionWriter {
    fn set_unlock_time(&mut self, unlock_time: u64) -> Result<()>;

    /// Adds a key input, returning its index and the one-time key pair of the spent output
    fn add_input(&mut self, sender: &AccountKeys, info: &InputKeyInfo) -> Result<(usize, KeyPair)>;

    /// Adds an output paying `amount` to a one-time key of `address`
    fn add_output(&mut self, amount: u64, address: &AccountPublicAddress) -> Result<usize>;

    /// Adds an output paying `amount` to an explicit key
    fn add_output_key(&mut self, amount: u64, key: &PublicKey) -> Result<usize>;

    fn set_transaction_secret_key(&mut self, secret_key: &SecretKey) -> Result<()>;

    fn set_payment_id(&mut self, payment_id: &PaymentId) -> Result<()>;

    fn sign_input_key(&mut self, index: usize, info: &InputKeyInfo, ephemeral_keys: &KeyPair) -> Result<()>;
}

/// RelativeOffsets: ℕ* → ℕ*
///
/// `[a₀, a₁, ..., aₙ] ↦ [a₀, a₁ − a₀, ..., aₙ − aₙ₋₁]`. The input must be
/// ascending; None otherwise.
pub fn absolute_output_offsets_to_relative(absolute: &[u32]) -> Option<Vec<u32>> {
    let mut relative = Vec::with_capacity(absolute.len());
    let mut previous = 0u32;
    for (i, &offset) in absolute.iter().enumerate() {
        if i == 0 {
            relative.push(offset);
        } else {
            relative.push(offset.checked_sub(previous)?);
        }
        previous = offset;
    }
    Some(relative)
}

/// Inverse of [`absolute_output_offsets_to_relative`]; None on overflow
pub fn relative_output_offsets_to_absolute(relative: &[u32]) -> Option<Vec<u32>> {
    let mut absolute = Vec::with_capacity(relative.len());
    let mut current = 0u32;
    for (i, &offset) in relative.iter().enumerate() {
        current = if i == 0 { offset } else { current.checked_add(offset)? };
        absolute.push(current);
    }
    Some(absolute)
}

/// A transaction whose only input is a base input
pub fn is_coinbase(tx: &Transaction) -> bool {
    tx.inputs.len() == 1 && matches!(tx.inputs[0], TransactionInput::Base(_))
}

pub fn key_images(tx: &Transaction) -> Vec<KeyImage> {
    tx.inputs
        .iter()
        .filter_map(|input| match input {
            TransactionInput::Key(key) => Some(key.key_image),
            TransactionInput::Base(_) => None,
        })
        .collect()
}

/// Σ input amounts, rejecting overflow
pub fn sum_inputs(tx: &Transaction) -> std::result::Result<u64, ValidationError> {
    tx.inputs.iter().try_fold(0u64, |sum, input| {
        sum.checked_add(input.amount())
            .ok_or(ValidationError::InputsAmountOverflow)
    })
}

/// Σ output amounts, rejecting overflow
pub fn sum_outputs(tx: &Transaction) -> std::result::Result<u64, ValidationError> {
    tx.outputs.iter().try_fold(0u64, |sum, output| {
        sum.checked_add(output.amount)
            .ok_or(ValidationError::OutputsAmountOverflow)
    })
}

/// CheckInputs: 𝒯𝒳 → {valid, invalid}
///
/// 1. At least one input
/// 2. Only key inputs (base inputs belong to coinbase transactions)
/// 3. Every key input references at least one output, none twice
/// 4. No key image is used twice
/// 5. Σ input amounts does not overflow
pub fn check_inputs(tx: &Transaction) -> std::result::Result<(), ValidationError> {
    if tx.inputs.is_empty() {
        return Err(ValidationError::EmptyInputs);
    }

    let mut images = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let key = match input {
            TransactionInput::Key(key) => key,
            TransactionInput::Base(_) => return Err(ValidationError::BaseInputUnexpected),
        };
        if key.output_indexes.is_empty() {
            return Err(ValidationError::InputEmptyOutputUsage);
        }
        // relative offsets: a zero gap repeats the previous output
        if key.output_indexes.iter().skip(1).any(|&gap| gap == 0) {
            return Err(ValidationError::InputIdenticalOutputIndexes);
        }
        if !images.insert(key.key_image) {
            return Err(ValidationError::InputIdenticalKeyImages);
        }
    }

    sum_inputs(tx).map(|_| ())
}

/// CheckOutputs: 𝒯𝒳 → {valid, invalid}
///
/// 1. At least one output
/// 2. No zero amounts
/// 3. Every key decodes to a curve point
/// 4. Σ output amounts does not overflow
pub fn check_outputs(tx: &Transaction) -> std::result::Result<(), ValidationError> {
    if tx.outputs.is_empty() {
        return Err(ValidationError::EmptyOutputs);
    }
    for output in &tx.outputs {
        if output.amount == 0 {
            return Err(ValidationError::OutputZeroAmount);
        }
        if !check_key(&output.key) {
            return Err(ValidationError::OutputInvalidKey);
        }
    }
    sum_outputs(tx).map(|_| ())
}

/// CheckBaseTransaction: 𝒯𝒳 × ℕ → {valid, invalid}
///
/// 1. Exactly one input, a base input carrying `block_index`
/// 2. Outputs pass [`check_outputs`]
pub fn check_base_transaction(tx: &Transaction, block_index: u32) -> std::result::Result<(), ValidationError> {
    match tx.inputs.as_slice() {
        [] => return Err(ValidationError::EmptyInputs),
        [TransactionInput::Base(base)] => {
            if base.block_index != block_index {
                return Err(ValidationError::BaseInputWrongBlockIndex);
            }
        }
        _ => return Err(ValidationError::InputUnknownType),
    }
    check_outputs(tx)
}

/// CheckSignatureShapes: 𝒯𝒳 → {valid, invalid}
///
/// One signature group per input; a key input carries one signature per ring
/// member and a base input none. A transaction made only of base inputs may
/// omit the groups entirely.
pub fn check_signature_shapes(tx: &Transaction) -> std::result::Result<(), ValidationError> {
    let only_base = tx.inputs.iter().all(|input| matches!(input, TransactionInput::Base(_)));
    if only_base && tx.signatures.is_empty() {
        return Ok(());
    }
    if tx.signatures.len() != tx.inputs.len() {
        return Err(ValidationError::InputWrongSignaturesCount);
    }
    for (input, group) in tx.inputs.iter().zip(&tx.signatures) {
        let expected = match input {
            TransactionInput::Key(key) => key.output_indexes.len(),
            TransactionInput::Base(_) => 0,
        };
        if group.len() != expected {
            return Err(ValidationError::InputWrongSignaturesCount);
        }
    }
    Ok(())
}
