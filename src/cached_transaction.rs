//! Memoizing read-only view over a transaction
//!
//! Derived values are computed on first access and kept for the lifetime of
//! the view. The cells are not `Sync`; a [`CachedTransaction`] belongs to one
//! thread until it has been warmed.

use crate::crypto::fast_hash;
use crate::error::{ConsensusError, Result, ValidationError};
use crate::extra;
use crate::serialization::{from_binary_array, to_binary_array, transaction_prefix_to_binary_array};
use crate::transaction::{self as tx_rules, TransactionReader};
use crate::types::*;
use once_cell::unsync::OnceCell;
use std::collections::HashSet;
use tracing::debug;

/// Identity hash of a transaction: H(binary form)
pub fn transaction_hash(tx: &Transaction) -> Hash {
    fast_hash(&to_binary_array(tx))
}

/// Hash of the prefix, the message every ring signature signs
pub fn transaction_prefix_hash(tx: &Transaction) -> Hash {
    fast_hash(&transaction_prefix_to_binary_array(tx))
}

/// Memo cells shared by [`CachedTransaction`] and the transaction builder
///
/// Replacing the value with `TransactionCache::default()` invalidates every
/// cell at once.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransactionCache {
    binary: OnceCell<Vec<u8>>,
    hash: OnceCell<Hash>,
    prefix_hash: OnceCell<Hash>,
}

impl TransactionCache {
    pub(crate) fn with_binary(binary: Vec<u8>) -> Self {
        let cache = TransactionCache::default();
        let _ = cache.binary.set(binary);
        cache
    }

    pub(crate) fn binary<'a>(&'a self, tx: &Transaction) -> &'a [u8] {
        self.binary.get_or_init(|| to_binary_array(tx))
    }

    pub(crate) fn hash(&self, tx: &Transaction) -> Hash {
        *self.hash.get_or_init(|| fast_hash(self.binary(tx)))
    }

    pub(crate) fn prefix_hash(&self, tx: &Transaction) -> Hash {
        *self.prefix_hash.get_or_init(|| transaction_prefix_hash(tx))
    }
}

/// Immutable transaction with memoized derived values
#[derive(Debug, Clone)]
pub struct CachedTransaction {
    transaction: Transaction,
    cache: TransactionCache,
    key_images: OnceCell<Vec<KeyImage>>,
    key_image_set: OnceCell<std::result::Result<HashSet<KeyImage>, ValidationError>>,
    output_keys: OnceCell<Vec<PublicKey>>,
    input_amount: OnceCell<std::result::Result<u64, ValidationError>>,
    output_amount: OnceCell<std::result::Result<u64, ValidationError>>,
}

impl CachedTransaction {
    pub fn new(transaction: Transaction) -> Self {
        Self::with_cache(transaction, TransactionCache::default())
    }

    /// Decodes a transaction blob, keeping the blob as the binary form
    pub fn from_binary_array(blob: &[u8]) -> Result<Self> {
        let transaction = from_binary_array::<Transaction>(blob).map_err(|e| {
            debug!(error = %e, size = blob.len(), "transaction blob rejected");
            ConsensusError::Rejected(ValidationError::InvalidBinaryRepresentation)
        })?;
        Ok(Self::with_cache(transaction, TransactionCache::with_binary(blob.to_vec())))
    }

    fn with_cache(transaction: Transaction, cache: TransactionCache) -> Self {
        CachedTransaction {
            transaction,
            cache,
            key_images: OnceCell::new(),
            key_image_set: OnceCell::new(),
            output_keys: OnceCell::new(),
            input_amount: OnceCell::new(),
            output_amount: OnceCell::new(),
        }
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }

    pub fn transaction_hash(&self) -> Hash {
        self.cache.hash(&self.transaction)
    }

    pub fn transaction_prefix_hash(&self) -> Hash {
        self.cache.prefix_hash(&self.transaction)
    }

    pub fn transaction_binary_array(&self) -> &[u8] {
        self.cache.binary(&self.transaction)
    }

    pub fn blob_size(&self) -> u64 {
        self.transaction_binary_array().len() as u64
    }

    /// Key images of the key inputs, in input order
    pub fn key_images(&self) -> &[KeyImage] {
        self.key_images.get_or_init(|| tx_rules::key_images(&self.transaction))
    }

    /// Key images as a set; a repeated key image is a rejection
    pub fn key_images_set(&self) -> std::result::Result<&HashSet<KeyImage>, ValidationError> {
        self.key_image_set
            .get_or_init(|| {
                let mut set = HashSet::with_capacity(self.key_images().len());
                for image in self.key_images() {
                    if !set.insert(*image) {
                        return Err(ValidationError::InputIdenticalKeyImages);
                    }
                }
                Ok(set)
            })
            .as_ref()
            .map_err(|e| *e)
    }

    pub fn output_keys(&self) -> &[PublicKey] {
        self.output_keys
            .get_or_init(|| self.transaction.outputs.iter().map(|output| output.key).collect())
    }

    pub fn input_amount(&self) -> std::result::Result<u64, ValidationError> {
        *self.input_amount.get_or_init(|| tx_rules::sum_inputs(&self.transaction))
    }

    pub fn output_amount(&self) -> std::result::Result<u64, ValidationError> {
        *self.output_amount.get_or_init(|| tx_rules::sum_outputs(&self.transaction))
    }

    /// Fee = Σ inputs − Σ outputs
    pub fn fee(&self) -> std::result::Result<u64, ValidationError> {
        let inputs = self.input_amount()?;
        let outputs = self.output_amount()?;
        inputs
            .checked_sub(outputs)
            .ok_or(ValidationError::InputAmountInsufficient)
    }

    pub fn transaction_public_key(&self) -> Option<PublicKey> {
        extra::get_public_key(&self.transaction.extra)
    }

    pub fn payment_id(&self) -> Option<PaymentId> {
        extra::get_payment_id(&self.transaction.extra)
    }

    pub fn is_coinbase(&self) -> bool {
        tx_rules::is_coinbase(&self.transaction)
    }
}

impl From<Transaction> for CachedTransaction {
    fn from(transaction: Transaction) -> Self {
        CachedTransaction::new(transaction)
    }
}

impl TransactionReader for CachedTransaction {
    fn transaction_hash(&self) -> Hash {
        CachedTransaction::transaction_hash(self)
    }

    fn transaction_prefix_hash(&self) -> Hash {
        CachedTransaction::transaction_prefix_hash(self)
    }

    fn transaction_public_key(&self) -> Option<PublicKey> {
        CachedTransaction::transaction_public_key(self)
    }

    fn unlock_time(&self) -> u64 {
        self.transaction.unlock_time
    }

    fn payment_id(&self) -> Option<PaymentId> {
        CachedTransaction::payment_id(self)
    }

    fn input_count(&self) -> usize {
        self.transaction.inputs.len()
    }

    fn output_count(&self) -> usize {
        self.transaction.outputs.len()
    }

    fn input_total_amount(&self) -> std::result::Result<u64, ValidationError> {
        self.input_amount()
    }

    fn output_total_amount(&self) -> std::result::Result<u64, ValidationError> {
        self.output_amount()
    }

    fn key_images(&self) -> Vec<KeyImage> {
        CachedTransaction::key_images(self).to_vec()
    }

    fn transaction_data(&self) -> Vec<u8> {
        self.transaction_binary_array().to_vec()
    }
}
