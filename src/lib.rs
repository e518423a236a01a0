//! # CryptoNote Consensus
//!
//! Consensus and transaction-validation core of a CryptoNote-family cryptocurrency.
//!
//! This crate decides how many coins a block may mint, whether a transaction is
//! structurally and economically valid, how mining difficulty retargets, and
//! how chain positions are represented without ambiguity. Storage, networking
//! and wallets stay outside: they call in with decoded data and react to typed
//! results.
//!
//! ## Architecture
//!
//! Components, leaf first:
//! - [`position`]: `BlockHeight` / `BlockOffset` with a NULL sentinel
//! - [`difficulty`]: LWMA-3 and LWMA-2 retargeting
//! - [`currency`]: per-network rules (reward, static reward, fusion, unlock, genesis)
//! - [`cached_transaction`]: memoizing read-only transaction view
//! - [`transaction_builder`]: transaction assembly and ring signing
//! - [`validator`]: acceptance against a [`validator::ChainView`] and the eligible index
//!
//! ## Design Principles
//!
//! 1. **Typed Rejections**: every failed rule is a distinct [`ValidationError`]
//! 2. **Pluggable Proof of Work**: the hash function sits behind [`pow::HashOracle`]
//! 3. **Exact Version Pinning**: consensus-critical dependencies are pinned to exact versions
//! 4. **One Parameter Table**: everything version-dependent lives in [`parameters::VersionParameters`]
//!
//! ## Usage
//!
//! ```rust
//! use cryptonote_consensus::{ConsensusParameters, Currency, NetworkType};
//!
//! # fn main() -> cryptonote_consensus::Result<()> {
//! let currency = Currency::new(ConsensusParameters::for_network(NetworkType::TestNet)?);
//! let genesis_hash = currency.genesis_hash()?;
//! assert_eq!(genesis_hash, currency.genesis_hash()?);
//!
//! let reward = currency.get_block_reward(1, 0, 1_000, 1, 0)?;
//! assert!(reward.reward > 0);
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod position;
pub mod difficulty;
pub mod pow;
pub mod crypto;
pub mod serialization;
pub mod extra;
pub mod economic;
pub mod parameters;
pub mod currency;
pub mod block;
pub mod cached_transaction;
pub mod transaction;
pub mod transaction_builder;
pub mod validator;

// Re-export commonly used types
pub use types::*;
pub use error::{ConsensusError, DecodeError, Result, ValidationError};
pub use position::{BlockHeight, BlockOffset};
pub use difficulty::DifficultyAlgorithm;
pub use pow::{HashOracle, Sha256Oracle};
pub use parameters::{ConsensusParameters, ConsensusParametersBuilder};
pub use currency::{BlockReward, Currency};
pub use block::CachedBlock;
pub use cached_transaction::CachedTransaction;
pub use transaction::{TransactionReader, TransactionWriter};
pub use transaction_builder::TransactionBuilder;
pub use validator::{ChainView, EligibleIndex, PoolTransactionValidator, TransactionValidator};
