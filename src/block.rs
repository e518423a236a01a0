//! Block hashing and proof-of-work checks

use crate::cached_transaction::transaction_hash;
use crate::crypto::fast_hash;
use crate::pow::HashOracle;
use crate::serialization::{encode_block_header, to_binary_array, write_varint};
use crate::types::*;
use once_cell::unsync::OnceCell;

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut combined = [0u8; 64];
    combined[..32].copy_from_slice(left);
    combined[32..].copy_from_slice(right);
    fast_hash(&combined)
}

/// TreeHash: ℍ* → ℍ
///
/// CryptoNote tree layout. With `n ≥ 3` leaves and `c` the largest power of
/// two below `n`, the first `2c − n` leaves pass through unhashed and the
/// remaining ones are paired, giving exactly `c` nodes. Those are halved
/// pairwise down to the root. No node is ever paired with itself, so two
/// different leaf lists cannot share a root by repeating the last hash.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    match hashes.len() {
        0 => return NULL_HASH,
        1 => return hashes[0],
        2 => return hash_pair(&hashes[0], &hashes[1]),
        _ => {}
    }

    let count = hashes.len();
    let mut width = 1usize;
    while width * 2 < count {
        width *= 2;
    }

    let passthrough = 2 * width - count;
    let mut level: Vec<Hash> = hashes[..passthrough].to_vec();
    level.extend(
        hashes[passthrough..]
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1])),
    );

    while level.len() > 1 {
        level = level
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

/// Block with memoized hashing blob and identity hash
///
/// Not `Sync`: first access must happen on one thread.
#[derive(Debug, Clone)]
pub struct CachedBlock {
    block: BlockTemplate,
    base_transaction_hash: OnceCell<Hash>,
    hashing_blob: OnceCell<Vec<u8>>,
    block_hash: OnceCell<Hash>,
}

impl CachedBlock {
    pub fn new(block: BlockTemplate) -> Self {
        CachedBlock {
            block,
            base_transaction_hash: OnceCell::new(),
            hashing_blob: OnceCell::new(),
            block_hash: OnceCell::new(),
        }
    }

    pub fn block(&self) -> &BlockTemplate {
        &self.block
    }

    pub fn into_block(self) -> BlockTemplate {
        self.block
    }

    pub fn block_index(&self) -> Option<u32> {
        self.block.base_transaction.inputs.first().and_then(|input| match input {
            TransactionInput::Base(base) => Some(base.block_index),
            TransactionInput::Key(_) => None,
        })
    }

    pub fn base_transaction_hash(&self) -> Hash {
        *self
            .base_transaction_hash
            .get_or_init(|| transaction_hash(&self.block.base_transaction))
    }

    /// Header ‖ merkle root of (coinbase, transactions) ‖ transaction count
    pub fn block_hashing_blob(&self) -> &[u8] {
        self.hashing_blob.get_or_init(|| {
            let mut hashes = Vec::with_capacity(self.block.transaction_hashes.len() + 1);
            hashes.push(self.base_transaction_hash());
            hashes.extend_from_slice(&self.block.transaction_hashes);

            let mut blob = Vec::new();
            encode_block_header(&self.block, &mut blob);
            blob.extend_from_slice(&merkle_root(&hashes));
            write_varint(&mut blob, hashes.len() as u64);
            blob
        })
    }

    /// Identity hash: H(|blob| ‖ blob)
    pub fn block_hash(&self) -> Hash {
        *self.block_hash.get_or_init(|| {
            let blob = self.block_hashing_blob();
            let mut data = Vec::with_capacity(blob.len() + 10);
            write_varint(&mut data, blob.len() as u64);
            data.extend_from_slice(blob);
            fast_hash(&data)
        })
    }

    pub fn block_binary_array(&self) -> Vec<u8> {
        to_binary_array(&self.block)
    }

    /// Proof-of-work digest of the hashing blob
    pub fn pow_hash(&self, oracle: &dyn HashOracle) -> Hash {
        oracle.pow_hash(self.block_hashing_blob(), self.block.major_version)
    }

    pub fn check_proof_of_work(&self, oracle: &dyn HashOracle, difficulty: u64) -> bool {
        oracle.meets_target(&self.pow_hash(oracle), difficulty)
    }
}
