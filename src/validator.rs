//! Transaction acceptance against the chain
//!
//! [`TransactionValidator`] checks the transaction's shape, then asks the
//! [`ChainView`] whether a key image is spent. A double spend therefore
//! outranks fee, mixin, extra and ring failures. Ring signatures are checked
//! last, once the ring members' keys are known. An accepted transaction
//! yields its [`EligibleIndex`].

use crate::cached_transaction::CachedTransaction;
use crate::crypto::{check_ring_signature, is_valid_key_image};
use crate::currency::Currency;
use crate::error::{ConsensusError, Result, ValidationError};
use crate::extra::validate_extra;
use crate::position::BlockHeight;
use crate::transaction::{self as tx_rules, relative_output_offsets_to_absolute};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Output as recorded by the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Height of the block holding the output
    pub position: BlockHeight,
    pub key: PublicKey,
    /// Unlock value of the transaction that created the output
    pub unlock_time: u64,
}

/// Result of looking one output up by amount and global index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLookup {
    Resolved(ResolvedOutput),
    Unknown,
    Spent,
}

/// Read access to the chain state the validator needs
pub trait ChainView {
    fn top_index(&self) -> Result<BlockHeight>;

    fn is_key_image_spent(&self, key_image: &KeyImage) -> Result<bool>;

    /// One lookup per requested global index, in request order
    fn resolve_outputs(&self, amount: u64, global_indexes: &[u32]) -> Result<Vec<OutputLookup>>;
}

/// Transactions currently held by a memory pool
pub trait PoolView {
    fn contains_transaction(&self, hash: &Hash) -> bool;
}

impl PoolView for HashSet<Hash> {
    fn contains_transaction(&self, hash: &Hash) -> bool {
        self.contains(hash)
    }
}

/// Earliest height and time at which a transaction may enter a block
///
/// Both bounds only ever grow while a transaction is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleIndex {
    pub height: BlockHeight,
    pub timestamp: u64,
}

impl EligibleIndex {
    /// No restriction
    pub fn always() -> Self {
        EligibleIndex {
            height: BlockHeight::min(),
            timestamp: 0,
        }
    }

    pub fn new(height: BlockHeight, timestamp: u64) -> Self {
        EligibleIndex { height, timestamp }
    }

    /// Component-wise maximum
    pub fn lower_bound(self, other: EligibleIndex) -> Self {
        EligibleIndex {
            height: self.height.max(other.height),
            timestamp: self.timestamp.max(other.timestamp),
        }
    }

    pub fn merge(&mut self, other: EligibleIndex) {
        *self = self.lower_bound(other);
    }

    pub fn raise_height(&mut self, height: BlockHeight) {
        self.height = self.height.max(height);
    }

    pub fn raise_timestamp(&mut self, timestamp: u64) {
        self.timestamp = self.timestamp.max(timestamp);
    }

    pub fn is_satisfied_by(&self, height: BlockHeight, timestamp: u64) -> bool {
        !height.is_null() && height >= self.height && timestamp >= self.timestamp
    }
}

impl Default for EligibleIndex {
    fn default() -> Self {
        Self::always()
    }
}

fn reject(tx: &CachedTransaction, kind: ValidationError) -> ConsensusError {
    debug!(
        tx = %hex::encode(tx.transaction_hash()),
        reason = %kind,
        "transaction rejected"
    );
    ConsensusError::Rejected(kind)
}

/// Validates transactions for blocks of one major version
#[derive(Debug)]
pub struct TransactionValidator<'a, V: ChainView + ?Sized> {
    block_major_version: u8,
    chain: &'a V,
    currency: &'a Currency,
}

impl<'a, V: ChainView + ?Sized> TransactionValidator<'a, V> {
    pub fn new(block_major_version: u8, chain: &'a V, currency: &'a Currency) -> Self {
        TransactionValidator {
            block_major_version,
            chain,
            currency,
        }
    }

    /// Decodes and validates a transaction blob
    pub fn validate_blob(&self, blob: &[u8]) -> Result<(CachedTransaction, EligibleIndex)> {
        let tx = CachedTransaction::from_binary_array(blob)?;
        let eligible = self.validate(&tx)?;
        Ok((tx, eligible))
    }

    /// ValidateTransaction
    ///
    /// 1. Structural rules (size, version, input and output shape, duplicate key images)
    /// 2. No key image is spent on chain
    /// 3. Policy rules (key image domain, extra, signature shape, mixin, fee)
    /// 4. Every ring member resolves to an unspent output
    /// 5. Ring signatures verify against the resolved keys
    /// 6. The eligible index covers every resolved output and the unlock value
    pub fn validate(&self, tx: &CachedTransaction) -> Result<EligibleIndex> {
        self.check_structure(tx).map_err(|kind| reject(tx, kind))?;

        for key_image in tx.key_images() {
            if self.chain.is_key_image_spent(key_image)? {
                return Err(reject(tx, ValidationError::InputKeyImageAlreadySpent));
            }
        }

        self.check_policy(tx).map_err(|kind| reject(tx, kind))?;

        let top = self.chain.top_index()?;
        let prefix_hash = tx.transaction_prefix_hash();
        let mut eligible = EligibleIndex::always();

        let key_inputs = tx.transaction().inputs.iter().filter_map(|input| match input {
            TransactionInput::Key(key) => Some(key),
            TransactionInput::Base(_) => None,
        });
        for (key_input, signatures) in key_inputs.zip(&tx.transaction().signatures) {
            let outputs = match self.resolve_ring(key_input, top)? {
                Ok(outputs) => outputs,
                Err(kind) => return Err(reject(tx, kind)),
            };

            let ring: Vec<PublicKey> = outputs.iter().map(|output| output.key).collect();
            if !check_ring_signature(&prefix_hash, &key_input.key_image, &ring, signatures) {
                return Err(reject(tx, ValidationError::InputInvalidSignatures));
            }

            for output in &outputs {
                self.raise_for_output(&mut eligible, output);
            }
        }

        self.raise_for_unlock_time(&mut eligible, tx.transaction().unlock_time);
        Ok(eligible)
    }

    /// Rules that only need the transaction's own shape
    fn check_structure(&self, tx: &CachedTransaction) -> std::result::Result<(), ValidationError> {
        let params = self.currency.params();
        let transaction = tx.transaction();

        if tx.blob_size() > params.max_transaction_size() {
            return Err(ValidationError::TooLarge);
        }
        if transaction.version < params.min_transaction_version() || transaction.version > params.max_transaction_version() {
            return Err(ValidationError::InvalidVersion);
        }

        tx_rules::check_inputs(transaction)?;
        tx_rules::check_outputs(transaction)
    }

    fn check_policy(&self, tx: &CachedTransaction) -> std::result::Result<(), ValidationError> {
        let params = self.currency.params();
        let transaction = tx.transaction();

        if !tx.key_images().iter().all(is_valid_key_image) {
            return Err(ValidationError::InputInvalidDomainKeyImages);
        }
        validate_extra(&transaction.extra, params.max_extra_size())?;
        tx_rules::check_signature_shapes(transaction)?;

        self.check_mixin(transaction)?;

        let fee = tx.fee()?;
        let is_fusion = self
            .currency
            .is_fusion_transaction(transaction, tx.blob_size(), self.block_major_version);
        if !is_fusion && fee < self.currency.minimum_fee() {
            return Err(ValidationError::FeeInsufficient);
        }
        Ok(())
    }

    fn check_mixin(&self, tx: &Transaction) -> std::result::Result<(), ValidationError> {
        let minimum = usize::from(self.currency.minimum_mixin(self.block_major_version));
        let maximum = usize::from(self.currency.maximum_mixin(self.block_major_version));
        for input in &tx.inputs {
            if let TransactionInput::Key(key) = input {
                let mixin = key.output_indexes.len().saturating_sub(1);
                if mixin < minimum {
                    return Err(ValidationError::InputMixinTooLow);
                }
                if mixin > maximum {
                    return Err(ValidationError::InputMixinTooHigh);
                }
            }
        }
        Ok(())
    }

    /// Chain failures propagate as errors; unusable ring members are rejections
    fn resolve_ring(
        &self,
        input: &KeyInput,
        top: BlockHeight,
    ) -> Result<std::result::Result<Vec<ResolvedOutput>, ValidationError>> {
        let global_indexes = match relative_output_offsets_to_absolute(&input.output_indexes) {
            Some(indexes) => indexes,
            None => return Ok(Err(ValidationError::InputInvalidGlobalIndex)),
        };
        let lookups = self.chain.resolve_outputs(input.amount, &global_indexes)?;
        if lookups.len() != global_indexes.len() {
            return Ok(Err(ValidationError::InputInvalidGlobalIndex));
        }

        Ok(lookups
            .into_iter()
            .map(|lookup| match lookup {
                OutputLookup::Resolved(output) if !output.position.is_null() && output.position <= top => Ok(output),
                OutputLookup::Resolved(_) | OutputLookup::Unknown => Err(ValidationError::InputInvalidGlobalIndex),
                OutputLookup::Spent => Err(ValidationError::InputSpendLockedOut),
            })
            .collect())
    }

    /// An output is usable from the block after its own and once its unlock value is reached
    fn raise_for_output(&self, eligible: &mut EligibleIndex, output: &ResolvedOutput) {
        let params = self.currency.params();
        eligible.raise_height(output.position.next(1));

        if self.currency.is_locked_based_on_block_index(output.unlock_time) {
            let index = output
                .unlock_time
                .saturating_sub(u64::from(params.locked_tx_allowed_delta_blocks()));
            eligible.raise_height(BlockHeight::from_index(index as u32));
        } else {
            eligible.raise_timestamp(
                output
                    .unlock_time
                    .saturating_sub(params.locked_tx_allowed_delta_seconds()),
            );
        }
    }

    /// A block-index unlock may not reach further than the future unlock limit
    fn raise_for_unlock_time(&self, eligible: &mut EligibleIndex, unlock_time: u64) {
        if !self.currency.is_locked_based_on_block_index(unlock_time) {
            return;
        }
        let limit = self.currency.params().version(self.block_major_version).future_unlock_limit;
        let index = unlock_time.saturating_sub(u64::from(limit));
        eligible.raise_height(BlockHeight::from_index(index as u32));
    }
}

/// Memory pool admission: chain validation plus pool-specific limits
#[derive(Debug)]
pub struct PoolTransactionValidator<'a, V: ChainView + ?Sized, P: PoolView + ?Sized> {
    validator: TransactionValidator<'a, V>,
    pool: &'a P,
    current_time: u64,
}

impl<'a, V: ChainView + ?Sized, P: PoolView + ?Sized> PoolTransactionValidator<'a, V, P> {
    pub fn new(validator: TransactionValidator<'a, V>, pool: &'a P, current_time: u64) -> Self {
        PoolTransactionValidator {
            validator,
            pool,
            current_time,
        }
    }

    /// ValidatePoolTransaction
    ///
    /// 1. Not already in the pool
    /// 2. Ordinary transactions fit the reward zone budget
    /// 3. Chain validation
    /// 4. Spendable in the next block
    pub fn validate(&self, tx: &CachedTransaction) -> Result<EligibleIndex> {
        if self.pool.contains_transaction(&tx.transaction_hash()) {
            return Err(reject(tx, ValidationError::ExistsInPool));
        }

        let currency = self.validator.currency;
        let version = self.validator.block_major_version;
        let size = tx.blob_size();
        if size > currency.max_tx_size(version) && !currency.is_fusion_transaction(tx.transaction(), size, version) {
            return Err(reject(tx, ValidationError::TooLargeForRewardZone));
        }

        let eligible = self.validator.validate(tx)?;
        let next = self.validator.chain.top_index()?.next(1);
        if !eligible.is_satisfied_by(next, self.current_time) {
            return Err(reject(tx, ValidationError::InputSpendLockedOut));
        }
        Ok(eligible)
    }
}
