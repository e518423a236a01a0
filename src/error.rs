//! Error types for consensus validation

use thiserror::Error;

/// Crate-wide error type
///
/// Rejections of consensus rules travel through [`ConsensusError::Rejected`]
/// so callers can match on the exact [`ValidationError`] kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("Invalid consensus configuration: {0}")]
    Configuration(String),

    #[error("Consensus rule violated: {0}")]
    Rejected(#[from] ValidationError),

    #[error("Binary decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Chain view failure: {0}")]
    ChainView(String),

    #[error("Transaction is already signed and can no longer be modified")]
    TransactionAlreadySigned,
}

impl ConsensusError {
    /// Rejection kind, if this error is an ordinary consensus rejection
    pub fn rejection(&self) -> Option<ValidationError> {
        match self {
            ConsensusError::Rejected(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Closed set of rejection kinds for transactions and blocks
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationError {
    #[error("transaction has no inputs")]
    EmptyInputs,
    #[error("transaction has no outputs")]
    EmptyOutputs,
    #[error("input type is not supported")]
    InputUnknownType,
    #[error("key input references no outputs")]
    InputEmptyOutputUsage,
    #[error("key image is not a valid group element")]
    InputInvalidDomainKeyImages,
    #[error("key image is used twice in the same transaction")]
    InputIdenticalKeyImages,
    #[error("key input references the same output twice")]
    InputIdenticalOutputIndexes,
    #[error("key image is already spent")]
    InputKeyImageAlreadySpent,
    #[error("referenced output does not exist")]
    InputInvalidGlobalIndex,
    #[error("referenced output is consumed or still locked")]
    InputSpendLockedOut,
    #[error("ring signature is invalid")]
    InputInvalidSignatures,
    #[error("signature count does not match the ring size")]
    InputWrongSignaturesCount,
    #[error("sum of input amounts overflows")]
    InputsAmountOverflow,
    #[error("base input is not allowed here")]
    BaseInputUnexpected,
    #[error("base input carries the wrong block index")]
    BaseInputWrongBlockIndex,
    #[error("inputs do not cover the outputs")]
    InputAmountInsufficient,
    #[error("fee is below the minimum")]
    FeeInsufficient,
    #[error("output amount is zero")]
    OutputZeroAmount,
    #[error("output key is not a valid public key")]
    OutputInvalidKey,
    #[error("sum of output amounts overflows")]
    OutputsAmountOverflow,
    #[error("transaction version is not supported")]
    InvalidVersion,
    #[error("mixin count is above the maximum")]
    InputMixinTooHigh,
    #[error("mixin count is below the minimum")]
    InputMixinTooLow,
    #[error("extra field is malformed")]
    ExtraIllFormed,
    #[error("extra field carries no transaction public key")]
    ExtraMissingPublicKey,
    #[error("extra field carries an invalid transaction public key")]
    ExtraInvalidPublicKey,
    #[error("extra field carries more than one transaction public key")]
    ExtraDuplicatePublicKey,
    #[error("extra field carries an invalid payment id")]
    ExtraInvalidPaymentId,
    #[error("extra field is too large")]
    ExtraTooLarge,
    #[error("transaction is too large")]
    TooLarge,
    #[error("transaction does not fit into the reward zone")]
    TooLargeForRewardZone,
    #[error("transaction is already in the pool")]
    ExistsInPool,
    #[error("transaction blob cannot be decoded")]
    InvalidBinaryRepresentation,
    #[error("block cumulative size is too big for a reward")]
    BlockCumulativeSizeTooBig,
}

/// Failures of the binary codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("varint does not fit the target integer")]
    VarintOverflow,
    #[error("varint is not in its shortest form")]
    NonCanonicalVarint,
    #[error("flag byte 0x{0:02x} is neither 0 nor 1")]
    InvalidFlag(u8),
    #[error("unknown input tag 0x{0:02x}")]
    UnknownInputTag(u8),
    #[error("unknown output tag 0x{0:02x}")]
    UnknownOutputTag(u8),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("chain height {0} is out of range")]
    HeightOutOfRange(u64),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("length {0} exceeds the remaining input")]
    LengthOutOfRange(u64),
}

/// Result type for consensus operations
pub type Result<T> = std::result::Result<T, ConsensusError>;
