//! Core CryptoNote types for consensus validation

use crate::error::DecodeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Payment identifier carried in the transaction extra
pub type PaymentId = Hash;

/// The all-zero hash
pub const NULL_HASH: Hash = [0u8; 32];

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LENGTH: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn from_hex(text: &str) -> Result<Self, DecodeError> {
                let bytes = hex::decode(text).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;
                let bytes: [u8; $len] = bytes.try_into().map_err(|bytes: Vec<u8>| {
                    DecodeError::InvalidHex(format!("expected {} bytes, got {}", $len, bytes.len()))
                })?;
                Ok($name(bytes))
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name([0u8; $len])
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                $name::from_hex(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// Compressed secp256k1 point
    PublicKey,
    33
);

fixed_bytes!(
    /// secp256k1 scalar in big-endian form
    SecretKey,
    32
);

fixed_bytes!(
    /// Key image: I = x·Hp(P)
    KeyImage,
    33
);

fixed_bytes!(
    /// Shared secret point: D = r·A
    KeyDerivation,
    33
);

fixed_bytes!(
    /// One ring member signature: (c, r)
    Signature,
    64
);

/// Network the parameter set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    MainNet,
    StageNet,
    TestNet,
    LocalTestNet,
}

impl NetworkType {
    /// Numeric network identifier
    pub const fn id(self) -> u8 {
        match self {
            NetworkType::MainNet => 0,
            NetworkType::StageNet => 1,
            NetworkType::TestNet => 2,
            NetworkType::LocalTestNet => 3,
        }
    }

    pub const fn is_main_net(self) -> bool {
        matches!(self, NetworkType::MainNet)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkType::MainNet => "MainNet",
            NetworkType::StageNet => "StageNet",
            NetworkType::TestNet => "TestNet",
            NetworkType::LocalTestNet => "LocalTestNet",
        };
        f.write_str(name)
    }
}

/// Key pair: 𝒦 = 𝒫 × 𝒮
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
}

/// Public address: spend key B and view key A
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountPublicAddress {
    pub spend_public_key: PublicKey,
    pub view_public_key: PublicKey,
}

/// Full account keys (b, a) together with the public address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountKeys {
    pub address: AccountPublicAddress,
    pub spend_secret_key: SecretKey,
    pub view_secret_key: SecretKey,
}

/// Coinbase input: carries the index of the block minting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseInput {
    pub block_index: u32,
}

/// Key input: spends one output of a ring
///
/// `output_indexes` are relative: the first entry is an absolute global index,
/// every later one is the gap to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    pub amount: u64,
    pub output_indexes: Vec<u32>,
    pub key_image: KeyImage,
}

/// Transaction Input: ℐ = BaseInput ∪ KeyInput
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionInput {
    Base(BaseInput),
    Key(KeyInput),
}

impl TransactionInput {
    pub fn amount(&self) -> u64 {
        match self {
            TransactionInput::Base(_) => 0,
            TransactionInput::Key(input) => input.amount,
        }
    }
}

/// Transaction Output: 𝒯 = ℕ × 𝒫
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub amount: u64,
    pub key: PublicKey,
}

/// Transaction: 𝒯𝒳 = ℕ × ℕ × ℐ* × 𝒯* × 𝔹* × 𝒮ig**
///
/// `unlock_time` is either a block index or a unix timestamp, see
/// [`crate::currency::Currency::is_locked_based_on_block_index`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub unlock_time: u64,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub extra: Vec<u8>,
    /// One ring signature per input, empty while unsigned
    pub signatures: Vec<Vec<Signature>>,
}

/// Block template: header fields, coinbase and the hashes of included transactions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTemplate {
    pub major_version: u8,
    pub minor_version: u8,
    pub timestamp: u64,
    pub previous_block_hash: Hash,
    pub nonce: u32,
    /// Commitment to the static reward transaction, when the version pays one
    pub static_reward_hash: Option<Hash>,
    pub base_transaction: Transaction,
    pub transaction_hashes: Vec<Hash>,
}
