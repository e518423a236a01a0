//! Transaction assembly and signing
//!
//! [`TransactionBuilder`] is both a [`TransactionReader`] and a
//! [`TransactionWriter`]. Once any signature has been committed the structure
//! is frozen: every mutator fails with
//! [`ConsensusError::TransactionAlreadySigned`].

use crate::cached_transaction::TransactionCache;
use crate::constants::MAX_TRANSACTION_VERSION;
use crate::crypto;
use crate::error::{ConsensusError, Result, ValidationError};
use crate::extra;
use crate::transaction::{
    self as tx_rules, absolute_output_offsets_to_relative, InputKeyInfo, TransactionReader, TransactionWriter,
};
use crate::types::*;
use std::collections::HashSet;

/// Where the builder stands in the signing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    PartiallySigned,
    Signed,
}

/// Mutable transaction with lazily recomputed hashes
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    transaction: Transaction,
    secret_key: Option<SecretKey>,
    cache: TransactionCache,
}

impl TransactionBuilder {
    /// Fresh transaction keyed by a random transaction key pair
    pub fn new() -> Self {
        Self::with_key_pair(crypto::generate_keys())
    }

    /// Fresh transaction keyed by `keys`; the public key goes into the extra
    pub fn with_key_pair(keys: KeyPair) -> Self {
        let mut transaction = Transaction {
            version: MAX_TRANSACTION_VERSION,
            ..Transaction::default()
        };
        extra::add_public_key(&mut transaction.extra, &keys.public_key);
        TransactionBuilder {
            transaction,
            secret_key: Some(keys.secret_key),
            cache: TransactionCache::default(),
        }
    }

    /// Wraps an existing transaction; its secret key is unknown
    pub fn from_transaction(transaction: Transaction) -> Self {
        TransactionBuilder {
            transaction,
            secret_key: None,
            cache: TransactionCache::default(),
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }

    pub fn transaction_secret_key(&self) -> Option<SecretKey> {
        self.secret_key
    }

    pub fn signing_state(&self) -> SigningState {
        let signed = self.transaction.signatures.iter().filter(|group| !group.is_empty()).count();
        if signed == 0 {
            SigningState::Unsigned
        } else if signed < self.transaction.inputs.len() {
            SigningState::PartiallySigned
        } else {
            SigningState::Signed
        }
    }

    /// Adds the coinbase input of the block at `block_index`
    pub fn add_base_input(&mut self, block_index: u32) -> Result<usize> {
        self.ensure_unsigned()?;
        self.transaction
            .inputs
            .push(TransactionInput::Base(BaseInput { block_index }));
        self.invalidate();
        Ok(self.transaction.inputs.len() - 1)
    }

    pub fn add_extra_nonce(&mut self, nonce: &[u8]) -> Result<()> {
        self.ensure_unsigned()?;
        extra::add_nonce(&mut self.transaction.extra, nonce)?;
        self.invalidate();
        Ok(())
    }

    /// Input types are supported, amounts do not overflow, key images are unique
    pub fn validate_inputs(&self) -> std::result::Result<(), ValidationError> {
        tx_rules::sum_inputs(&self.transaction)?;
        let mut images = HashSet::new();
        for image in tx_rules::key_images(&self.transaction) {
            if !images.insert(image) {
                return Err(ValidationError::InputIdenticalKeyImages);
            }
        }
        Ok(())
    }

    pub fn validate_outputs(&self) -> std::result::Result<(), ValidationError> {
        tx_rules::check_outputs(&self.transaction)
    }

    /// One signature group per input, each covering at least its ring
    pub fn validate_signatures(&self) -> std::result::Result<(), ValidationError> {
        if self.transaction.signatures.len() != self.transaction.inputs.len() {
            return Err(ValidationError::InputWrongSignaturesCount);
        }
        for (input, group) in self.transaction.inputs.iter().zip(&self.transaction.signatures) {
            let required = match input {
                TransactionInput::Key(key) => key.output_indexes.len(),
                TransactionInput::Base(_) => 0,
            };
            if group.len() < required {
                return Err(ValidationError::InputWrongSignaturesCount);
            }
        }
        Ok(())
    }

    fn ensure_unsigned(&self) -> Result<()> {
        if self.signing_state() != SigningState::Unsigned {
            return Err(ConsensusError::TransactionAlreadySigned);
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.cache = TransactionCache::default();
    }

    fn secret_key(&self) -> Result<SecretKey> {
        self.secret_key
            .ok_or_else(|| ConsensusError::Crypto("transaction secret key is not set".to_string()))
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Ring of an input ordered by global index, with the signer's position in it
struct SortedRing {
    global_indexes: Vec<u32>,
    keys: Vec<PublicKey>,
    real_index: usize,
}

fn sort_ring(info: &InputKeyInfo) -> Result<SortedRing> {
    let real = info
        .outputs
        .get(info.real_output.transaction_index)
        .ok_or_else(|| {
            ConsensusError::Crypto(format!(
                "real output {} outside ring of {}",
                info.real_output.transaction_index,
                info.outputs.len()
            ))
        })?;

    let mut ring = info.outputs.clone();
    ring.sort_by_key(|output| output.output_index);
    if ring.windows(2).any(|pair| pair[0].output_index == pair[1].output_index) {
        return Err(ValidationError::InputIdenticalOutputIndexes.into());
    }
    let real_index = ring
        .iter()
        .position(|output| output.output_index == real.output_index)
        .ok_or_else(|| ConsensusError::Crypto("real output missing from ring".to_string()))?;

    Ok(SortedRing {
        global_indexes: ring.iter().map(|output| output.output_index).collect(),
        keys: ring.iter().map(|output| output.target_key).collect(),
        real_index,
    })
}

impl TransactionWriter for TransactionBuilder {
    fn set_unlock_time(&mut self, unlock_time: u64) -> Result<()> {
        self.ensure_unsigned()?;
        self.transaction.unlock_time = unlock_time;
        self.invalidate();
        Ok(())
    }

    fn add_input(&mut self, sender: &AccountKeys, info: &InputKeyInfo) -> Result<(usize, KeyPair)> {
        self.ensure_unsigned()?;

        let ring = sort_ring(info)?;
        let derivation =
            crypto::generate_key_derivation(&info.real_output.transaction_public_key, &sender.view_secret_key)?;
        let output_index = info.real_output.output_in_transaction;
        let ephemeral = KeyPair {
            public_key: crypto::derive_public_key(&derivation, output_index, &sender.address.spend_public_key)?,
            secret_key: crypto::derive_secret_key(&derivation, output_index, &sender.spend_secret_key)?,
        };
        if ephemeral.public_key != ring.keys[ring.real_index] {
            return Err(ConsensusError::Crypto(
                "real output key does not belong to the sender".to_string(),
            ));
        }

        let key_image = crypto::generate_key_image(&ephemeral.public_key, &ephemeral.secret_key)?;
        let output_indexes = absolute_output_offsets_to_relative(&ring.global_indexes)
            .ok_or(ValidationError::InputIdenticalOutputIndexes)?;

        self.transaction.inputs.push(TransactionInput::Key(KeyInput {
            amount: info.amount,
            output_indexes,
            key_image,
        }));
        self.invalidate();
        Ok((self.transaction.inputs.len() - 1, ephemeral))
    }

    fn add_output(&mut self, amount: u64, address: &AccountPublicAddress) -> Result<usize> {
        self.ensure_unsigned()?;
        let secret_key = self.secret_key()?;
        let index = self.transaction.outputs.len();
        let derivation = crypto::generate_key_derivation(&address.view_public_key, &secret_key)?;
        let key = crypto::derive_public_key(&derivation, index, &address.spend_public_key)?;
        self.transaction.outputs.push(TransactionOutput { amount, key });
        self.invalidate();
        Ok(index)
    }

    fn add_output_key(&mut self, amount: u64, key: &PublicKey) -> Result<usize> {
        self.ensure_unsigned()?;
        self.transaction.outputs.push(TransactionOutput { amount, key: *key });
        self.invalidate();
        Ok(self.transaction.outputs.len() - 1)
    }

    fn set_transaction_secret_key(&mut self, secret_key: &SecretKey) -> Result<()> {
        self.ensure_unsigned()?;
        let public_key = crypto::secret_key_to_public_key(secret_key)?;
        if extra::get_public_key(&self.transaction.extra) != Some(public_key) {
            return Err(ConsensusError::Crypto(
                "secret key does not match the transaction public key".to_string(),
            ));
        }
        self.secret_key = Some(*secret_key);
        Ok(())
    }

    fn set_payment_id(&mut self, payment_id: &PaymentId) -> Result<()> {
        self.ensure_unsigned()?;
        extra::set_payment_id(&mut self.transaction.extra, payment_id)?;
        self.invalidate();
        Ok(())
    }

    fn sign_input_key(&mut self, index: usize, info: &InputKeyInfo, ephemeral_keys: &KeyPair) -> Result<()> {
        let key_image = match self.transaction.inputs.get(index) {
            Some(TransactionInput::Key(input)) => input.key_image,
            Some(TransactionInput::Base(_)) => return Err(ValidationError::InputUnknownType.into()),
            None => {
                return Err(ConsensusError::Crypto(format!(
                    "input {} outside {} inputs",
                    index,
                    self.transaction.inputs.len()
                )))
            }
        };

        let ring = sort_ring(info)?;
        let prefix_hash = self.cache.prefix_hash(&self.transaction);
        let signatures = crypto::generate_ring_signature(
            &prefix_hash,
            &key_image,
            &ring.keys,
            &ephemeral_keys.secret_key,
            ring.real_index,
        )?;

        if self.transaction.signatures.len() < self.transaction.inputs.len() {
            self.transaction.signatures.resize(self.transaction.inputs.len(), Vec::new());
        }
        self.transaction.signatures[index] = signatures;
        self.invalidate();
        Ok(())
    }
}

impl TransactionReader for TransactionBuilder {
    fn transaction_hash(&self) -> Hash {
        self.cache.hash(&self.transaction)
    }

    fn transaction_prefix_hash(&self) -> Hash {
        self.cache.prefix_hash(&self.transaction)
    }

    fn transaction_public_key(&self) -> Option<PublicKey> {
        extra::get_public_key(&self.transaction.extra)
    }

    fn unlock_time(&self) -> u64 {
        self.transaction.unlock_time
    }

    fn payment_id(&self) -> Option<PaymentId> {
        extra::get_payment_id(&self.transaction.extra)
    }

    fn input_count(&self) -> usize {
        self.transaction.inputs.len()
    }

    fn output_count(&self) -> usize {
        self.transaction.outputs.len()
    }

    fn input_total_amount(&self) -> std::result::Result<u64, ValidationError> {
        tx_rules::sum_inputs(&self.transaction)
    }

    fn output_total_amount(&self) -> std::result::Result<u64, ValidationError> {
        tx_rules::sum_outputs(&self.transaction)
    }

    fn key_images(&self) -> Vec<KeyImage> {
        tx_rules::key_images(&self.transaction)
    }

    fn transaction_data(&self) -> Vec<u8> {
        self.cache.binary(&self.transaction).to_vec()
    }
}
