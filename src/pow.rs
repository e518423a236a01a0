//! Proof of work and the pluggable hash oracle
//!
//! The consensus core never picks a proof-of-work function itself. It talks to
//! a [`HashOracle`] and only owns the target comparison. Identity hashes
//! (transaction ids, block ids, merkle nodes) are always
//! [`crate::crypto::fast_hash`] and never go through the oracle.

use crate::types::Hash;
use sha2::{Digest, Sha256};

/// Hash oracle: 𝔹* → ℍ
///
/// `pow_hash` receives the block hashing blob and the block major version so
/// an implementation can switch algorithms at a fork.
pub trait HashOracle: Send + Sync {
    /// Proof-of-work digest of a block hashing blob
    fn pow_hash(&self, blob: &[u8], major_version: u8) -> Hash;

    /// Whether `digest` satisfies `difficulty`
    fn meets_target(&self, digest: &Hash, difficulty: u64) -> bool {
        check_hash(digest, difficulty)
    }
}

/// SHA-256 backed oracle
///
/// `pow_hash` is SHA-256d.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Oracle;

impl HashOracle for Sha256Oracle {
    fn pow_hash(&self, blob: &[u8], _major_version: u8) -> Hash {
        let first = Sha256::digest(blob);
        Sha256::digest(first).into()
    }
}

/// CheckHash: ℍ × ℕ → {true, false}
///
/// The digest is read as a little-endian 256-bit integer `h`.
/// Formula: h × difficulty < 2²⁵⁶
///
/// A difficulty of zero never passes.
pub fn check_hash(digest: &Hash, difficulty: u64) -> bool {
    if difficulty == 0 {
        return false;
    }
    !U256::from_bytes(digest).overflowing_mul_u64(difficulty)
}

/// 256-bit little-endian integer for target checks
#[derive(Debug, Clone, PartialEq, Eq)]
struct U256([u64; 4]);

impl U256 {
    fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            *word = u64::from_le_bytes(chunk);
        }
        U256(words)
    }

    /// True when `self × factor` does not fit in 256 bits
    fn overflowing_mul_u64(&self, factor: u64) -> bool {
        let mut carry: u128 = 0;
        for &word in &self.0 {
            let product = u128::from(word) * u128::from(factor) + carry;
            carry = product >> 64;
        }
        carry != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_one_accepts_everything() {
        assert!(check_hash(&[0xff; 32], 1));
        assert!(check_hash(&[0x00; 32], 1));
    }

    #[test]
    fn test_zero_difficulty_rejects() {
        assert!(!check_hash(&[0x00; 32], 0));
    }

    #[test]
    fn test_high_word_limits_difficulty() {
        // h = 2^255: only difficulty 1 fits
        let mut digest = [0u8; 32];
        digest[31] = 0x80;
        assert!(check_hash(&digest, 1));
        assert!(!check_hash(&digest, 2));

        // h = 2^248: difficulty up to 2^8 fits
        let mut digest = [0u8; 32];
        digest[31] = 0x01;
        assert!(check_hash(&digest, 255));
        assert!(!check_hash(&digest, 256));
    }

    #[test]
    fn test_carry_propagates_from_low_words() {
        // h = 2^192 - 1
        let mut digest = [0xffu8; 32];
        digest[24..].copy_from_slice(&[0u8; 8]);
        assert!(check_hash(&digest, u64::MAX));

        // top word 0x5555...55 times 3 is exactly u64::MAX, the carry of 2 tips it over
        let mut digest = [0xffu8; 32];
        digest[24..].copy_from_slice(&[0x55; 8]);
        assert!(!check_hash(&digest, 3));

        digest[24] = 0x54;
        assert!(check_hash(&digest, 3));
    }

    #[test]
    fn test_sha256_oracle() {
        let oracle = Sha256Oracle;
        let digest = oracle.pow_hash(b"abc", 1);
        assert_eq!(
            hex::encode(digest),
            "4f8b42c22dd3729b519ba6f68d2da7cc5b2d606d05daed5ad5128cc03e6c6358"
        );
        assert_eq!(digest, crate::crypto::fast_hash(&crate::crypto::fast_hash(b"abc")));
        assert_eq!(oracle.pow_hash(b"abc", 7), digest);
        assert!(oracle.meets_target(&digest, 1));
    }
}
