//! Consensus parameters
//!
//! A [`ConsensusParameters`] value is assembled once per network through
//! [`ConsensusParametersBuilder`] (or loaded from JSON), validated, and never
//! mutated afterwards. Everything that changes with the block major version
//! lives in one table of [`VersionParameters`] entries.

use crate::constants::*;
use crate::difficulty::DifficultyAlgorithm;
use crate::error::{ConsensusError, Result};
use crate::types::{AccountPublicAddress, NetworkType, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Block reward shape of one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardParameters {
    /// Blocks contributing to the median size
    pub window: usize,
    /// Blocks up to this size earn the full reward
    pub full_reward_zone: u64,
    /// Low decimal digits removed from the penalized base reward
    pub cutoff_digits: u32,
    /// Whether the size penalty also applies to fees
    pub penalize_fee: bool,
}

/// Anonymity set bounds of one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinParameters {
    pub minimum: u8,
    pub maximum: u8,
    /// Mixin wallets use by default
    pub required: u8,
    /// Mixable outputs that must exist before `required` is enforced
    pub required_threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionParameters {
    pub max_size: u64,
    pub min_input_count: usize,
    pub min_in_out_count_ratio: usize,
    /// Inputs below this amount disqualify a fusion transaction
    #[serde(default)]
    pub dust_threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyParameters {
    pub algorithm: DifficultyAlgorithm,
    pub window: usize,
    pub initial: u64,
}

/// Static reward of one version; disabled when the amount is zero and no address is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRewardParameters {
    pub amount: u64,
    pub address: Option<AccountPublicAddress>,
}

impl StaticRewardParameters {
    pub fn is_enabled(&self) -> bool {
        self.amount > 0 && self.address.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParameters {
    /// Blocks whose median timestamp bounds a new block from below
    pub past_window: usize,
    /// Seconds a block timestamp may lie in the future
    pub future_limit: u64,
}

/// Every version-dependent rule, activated at `activation_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionParameters {
    pub version: u8,
    pub activation_index: u32,
    pub reward: RewardParameters,
    pub mixin: MixinParameters,
    pub fusion: FusionParameters,
    pub difficulty: DifficultyParameters,
    pub static_reward: StaticRewardParameters,
    pub time: TimeParameters,
    /// Blocks a transaction may lock its outputs beyond its inclusion index
    pub future_unlock_limit: u32,
}

/// Per-network consensus parameter set
///
/// Only [`ConsensusParametersBuilder::build`] and deserialization create
/// values, and both validate, so every instance is consistent. Fields are
/// read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ParameterSet", into = "ParameterSet")]
pub struct ConsensusParameters {
    set: ParameterSet,
}

/// Field storage of [`ConsensusParameters`], unvalidated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ParameterSet {
    network: NetworkType,
    money_supply: u64,
    emission_speed_shift: u32,
    decimal_places: u8,
    minimum_fee: u64,
    genesis_block_reward: u64,
    genesis_timestamp: u64,
    genesis_minor_version: u8,
    /// Hex encoded coinbase of the genesis block
    genesis_coinbase: String,
    difficulty_target: u64,
    /// Largest unlock value read as a block index
    max_block_number: u32,
    max_block_size_initial: u64,
    max_block_size_growth_numerator: u64,
    max_block_size_growth_denominator: u64,
    max_transaction_size: u64,
    miner_tx_blob_reserved_size: u64,
    mined_money_unlock_window: u32,
    locked_tx_allowed_delta_blocks: u32,
    locked_tx_allowed_delta_seconds: u64,
    max_extra_size: usize,
    min_transaction_version: u8,
    max_transaction_version: u8,
    /// Mixed with the previous block hash to key static reward transactions
    static_reward_salt: String,
    versions: Vec<VersionParameters>,
}

impl TryFrom<ParameterSet> for ConsensusParameters {
    type Error = ConsensusError;

    fn try_from(set: ParameterSet) -> Result<Self> {
        set.validate()?;
        Ok(ConsensusParameters { set })
    }
}

impl From<ConsensusParameters> for ParameterSet {
    fn from(params: ConsensusParameters) -> Self {
        params.set
    }
}

macro_rules! accessors {
    ($($(#[$meta:meta])* $name:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> $ty {
                self.set.$name
            }
        )*
    };
}

impl ConsensusParameters {
    /// Validated defaults of a network
    pub fn for_network(network: NetworkType) -> Result<Self> {
        ConsensusParametersBuilder::new(network).build()
    }

    /// Loads and validates a parameter set from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ConsensusError::Configuration(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConsensusError::Configuration(e.to_string()))
    }

    accessors! {
        network: NetworkType,
        money_supply: u64,
        emission_speed_shift: u32,
        decimal_places: u8,
        minimum_fee: u64,
        /// Reward of the first block, `0` to follow the emission curve
        genesis_block_reward: u64,
        genesis_timestamp: u64,
        genesis_minor_version: u8,
        difficulty_target: u64,
        /// Largest unlock value read as a block index
        max_block_number: u32,
        max_block_size_initial: u64,
        max_block_size_growth_numerator: u64,
        max_block_size_growth_denominator: u64,
        max_transaction_size: u64,
        miner_tx_blob_reserved_size: u64,
        mined_money_unlock_window: u32,
        locked_tx_allowed_delta_blocks: u32,
        locked_tx_allowed_delta_seconds: u64,
        max_extra_size: usize,
        min_transaction_version: u8,
        max_transaction_version: u8,
    }

    /// Hex encoded coinbase of the genesis block
    pub fn genesis_coinbase(&self) -> &str {
        &self.set.genesis_coinbase
    }

    pub fn static_reward_salt(&self) -> &str {
        &self.set.static_reward_salt
    }

    /// Version table, never empty
    pub fn versions(&self) -> &[VersionParameters] {
        &self.set.versions
    }

    /// Atomic units per coin
    pub fn coin(&self) -> u64 {
        10u64.pow(u32::from(self.set.decimal_places))
    }

    /// Parameters in force for a block major version
    ///
    /// Versions below the first entry fall back to it.
    pub fn version(&self, version: u8) -> &VersionParameters {
        self.lookup(|entry| entry.version <= version)
    }

    /// Parameters in force at a block index
    pub fn version_at_index(&self, index: u32) -> &VersionParameters {
        self.lookup(|entry| entry.activation_index <= index)
    }

    fn lookup(&self, applies: impl Fn(&VersionParameters) -> bool) -> &VersionParameters {
        let versions = &self.set.versions;
        // validation rejects an empty table
        versions.iter().rev().find(|entry| applies(entry)).unwrap_or(&versions[0])
    }
}

impl ParameterSet {
    fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.emission_speed_shift) {
            return Err(config_error(format!(
                "emission speed shift {} outside 1..=64",
                self.emission_speed_shift
            )));
        }
        if self.decimal_places > 19 {
            return Err(config_error(format!("{} decimal places overflow u64", self.decimal_places)));
        }
        if self.max_block_size_growth_denominator == 0 {
            return Err(config_error("block size growth denominator is zero".to_string()));
        }
        if self.difficulty_target == 0 {
            return Err(config_error("difficulty target is zero".to_string()));
        }
        if self.min_transaction_version > self.max_transaction_version {
            return Err(config_error("minimum transaction version exceeds maximum".to_string()));
        }
        if self.genesis_coinbase.is_empty() {
            return Err(config_error("genesis coinbase is empty".to_string()));
        }

        let first = self
            .versions
            .first()
            .ok_or_else(|| config_error("version table is empty".to_string()))?;
        if first.version != 1 || first.activation_index != 0 {
            return Err(config_error("version table must start with version 1 at index 0".to_string()));
        }
        for pair in self.versions.windows(2) {
            if pair[1].version <= pair[0].version || pair[1].activation_index <= pair[0].activation_index {
                return Err(config_error(format!(
                    "version {} must follow version {} in version and activation order",
                    pair[1].version, pair[0].version
                )));
            }
        }

        for entry in &self.versions {
            if entry.mixin.minimum > entry.mixin.maximum {
                return Err(config_error(format!("version {}: minimum mixin exceeds maximum", entry.version)));
            }
            if entry.fusion.min_in_out_count_ratio == 0 {
                return Err(config_error(format!("version {}: fusion ratio is zero", entry.version)));
            }
            if entry.difficulty.window == 0 {
                return Err(config_error(format!("version {}: difficulty window is zero", entry.version)));
            }
            validate_static_reward(entry)?;
        }
        Ok(())
    }
}

fn config_error(message: String) -> ConsensusError {
    ConsensusError::Configuration(message)
}

fn validate_static_reward(entry: &VersionParameters) -> Result<()> {
    let reward = &entry.static_reward;
    match (reward.amount > 0, reward.address.is_some()) {
        (true, false) => {
            error!(version = entry.version, amount = reward.amount, "static reward amount set without an address");
            Err(config_error(format!(
                "version {}: static reward amount set without an address",
                entry.version
            )))
        }
        (false, true) => {
            error!(version = entry.version, "static reward address set without an amount");
            Err(config_error(format!(
                "version {}: static reward address set without an amount",
                entry.version
            )))
        }
        _ => Ok(()),
    }
}

/// Builder for [`ConsensusParameters`], seeded with the network defaults
#[derive(Debug, Clone)]
pub struct ConsensusParametersBuilder {
    params: ParameterSet,
}

impl ConsensusParametersBuilder {
    pub fn new(network: NetworkType) -> Self {
        ConsensusParametersBuilder {
            params: default_parameters(network),
        }
    }

    pub fn money_supply(mut self, money_supply: u64) -> Self {
        self.params.money_supply = money_supply;
        self
    }

    pub fn emission_speed_shift(mut self, shift: u32) -> Self {
        self.params.emission_speed_shift = shift;
        self
    }

    pub fn decimal_places(mut self, decimal_places: u8) -> Self {
        self.params.decimal_places = decimal_places;
        self
    }

    pub fn minimum_fee(mut self, fee: u64) -> Self {
        self.params.minimum_fee = fee;
        self
    }

    pub fn genesis_block_reward(mut self, reward: u64) -> Self {
        self.params.genesis_block_reward = reward;
        self
    }

    pub fn genesis_timestamp(mut self, timestamp: u64) -> Self {
        self.params.genesis_timestamp = timestamp;
        self
    }

    pub fn genesis_coinbase(mut self, hex: impl Into<String>) -> Self {
        self.params.genesis_coinbase = hex.into();
        self
    }

    pub fn difficulty_target(mut self, seconds: u64) -> Self {
        self.params.difficulty_target = seconds;
        self
    }

    pub fn max_block_number(mut self, max_block_number: u32) -> Self {
        self.params.max_block_number = max_block_number;
        self
    }

    pub fn max_block_size(mut self, initial: u64, growth_numerator: u64, growth_denominator: u64) -> Self {
        self.params.max_block_size_initial = initial;
        self.params.max_block_size_growth_numerator = growth_numerator;
        self.params.max_block_size_growth_denominator = growth_denominator;
        self
    }

    pub fn max_transaction_size(mut self, size: u64) -> Self {
        self.params.max_transaction_size = size;
        self
    }

    pub fn miner_tx_blob_reserved_size(mut self, size: u64) -> Self {
        self.params.miner_tx_blob_reserved_size = size;
        self
    }

    pub fn mined_money_unlock_window(mut self, blocks: u32) -> Self {
        self.params.mined_money_unlock_window = blocks;
        self
    }

    pub fn locked_tx_allowed_delta(mut self, blocks: u32, seconds: u64) -> Self {
        self.params.locked_tx_allowed_delta_blocks = blocks;
        self.params.locked_tx_allowed_delta_seconds = seconds;
        self
    }

    pub fn static_reward_salt(mut self, salt: impl Into<String>) -> Self {
        self.params.static_reward_salt = salt.into();
        self
    }

    /// Replaces the whole version table
    pub fn versions(mut self, versions: Vec<VersionParameters>) -> Self {
        self.params.versions = versions;
        self
    }

    /// Applies `update` to every version entry
    pub fn update_versions(mut self, update: impl Fn(&mut VersionParameters)) -> Self {
        for entry in &mut self.params.versions {
            update(entry);
        }
        self
    }

    pub fn build(self) -> Result<ConsensusParameters> {
        ConsensusParameters::try_from(self.params)
    }
}

fn static_reward_address() -> Option<AccountPublicAddress> {
    let spend_public_key = PublicKey::from_hex(STATIC_REWARD_SPEND_PUBLIC_KEY).ok()?;
    let view_public_key = PublicKey::from_hex(STATIC_REWARD_VIEW_PUBLIC_KEY).ok()?;
    Some(AccountPublicAddress {
        spend_public_key,
        view_public_key,
    })
}

/// Version table shared by all networks, differing in activation heights
fn default_versions(second_version_index: u32) -> Vec<VersionParameters> {
    let address = static_reward_address();
    let static_reward = StaticRewardParameters {
        amount: if address.is_some() { STATIC_REWARD_AMOUNT } else { 0 },
        address,
    };
    let fusion = FusionParameters {
        max_size: FUSION_TX_MAX_SIZE,
        min_input_count: FUSION_TX_MIN_INPUT_COUNT,
        min_in_out_count_ratio: FUSION_TX_MIN_IN_OUT_COUNT_RATIO,
        dust_threshold: FUSION_TX_DUST_THRESHOLD,
    };

    vec![
        VersionParameters {
            version: 1,
            activation_index: 0,
            reward: RewardParameters {
                window: 100,
                full_reward_zone: 100_000,
                cutoff_digits: 0,
                penalize_fee: false,
            },
            mixin: MixinParameters {
                minimum: 0,
                maximum: 10,
                required: 3,
                required_threshold: 100,
            },
            fusion: fusion.clone(),
            difficulty: DifficultyParameters {
                algorithm: DifficultyAlgorithm::Lwma2,
                window: DIFFICULTY_WINDOW,
                initial: DIFFICULTY_INITIAL,
            },
            static_reward: static_reward.clone(),
            time: TimeParameters {
                past_window: BLOCK_TIMESTAMP_PAST_WINDOW,
                future_limit: BLOCK_FUTURE_TIME_LIMIT,
            },
            future_unlock_limit: TRANSACTION_FUTURE_UNLOCK_LIMIT,
        },
        VersionParameters {
            version: 2,
            activation_index: second_version_index,
            reward: RewardParameters {
                window: 100,
                full_reward_zone: 200_000,
                cutoff_digits: 2,
                penalize_fee: true,
            },
            mixin: MixinParameters {
                minimum: 1,
                maximum: 20,
                required: 5,
                required_threshold: 1_000,
            },
            fusion,
            difficulty: DifficultyParameters {
                algorithm: DifficultyAlgorithm::Lwma3,
                window: DIFFICULTY_WINDOW,
                initial: DIFFICULTY_INITIAL,
            },
            static_reward,
            time: TimeParameters {
                past_window: 16,
                future_limit: BLOCK_FUTURE_TIME_LIMIT,
            },
            future_unlock_limit: TRANSACTION_FUTURE_UNLOCK_LIMIT,
        },
    ]
}

/// Unvalidated defaults of a network
fn default_parameters(network: NetworkType) -> ParameterSet {
    let (genesis_coinbase, second_version_index, salt) = match network {
        NetworkType::MainNet => (GENESIS_COINBASE_MAINNET, 100_000, "static-reward/mainnet"),
        NetworkType::StageNet => (GENESIS_COINBASE_STAGENET, 10_000, "static-reward/stagenet"),
        NetworkType::TestNet => (GENESIS_COINBASE_TESTNET, 1_000, "static-reward/testnet"),
        NetworkType::LocalTestNet => (GENESIS_COINBASE_LOCALTESTNET, 10, "static-reward/localtestnet"),
    };

    ParameterSet {
        network,
        money_supply: MONEY_SUPPLY,
        emission_speed_shift: EMISSION_SPEED_SHIFT,
        decimal_places: COIN_DECIMAL_PLACES,
        minimum_fee: MINIMUM_FEE,
        genesis_block_reward: GENESIS_BLOCK_REWARD,
        genesis_timestamp: GENESIS_TIMESTAMP,
        genesis_minor_version: 0,
        genesis_coinbase: genesis_coinbase.to_string(),
        difficulty_target: DIFFICULTY_TARGET,
        max_block_number: MAX_BLOCK_NUMBER,
        max_block_size_initial: MAX_BLOCK_SIZE_INITIAL,
        max_block_size_growth_numerator: MAX_BLOCK_SIZE_GROWTH_NUMERATOR,
        max_block_size_growth_denominator: MAX_BLOCK_SIZE_GROWTH_DENOMINATOR,
        max_transaction_size: MAX_TRANSACTION_SIZE,
        miner_tx_blob_reserved_size: MINER_TX_BLOB_RESERVED_SIZE,
        mined_money_unlock_window: MINED_MONEY_UNLOCK_WINDOW,
        locked_tx_allowed_delta_blocks: LOCKED_TX_ALLOWED_DELTA_BLOCKS,
        locked_tx_allowed_delta_seconds: LOCKED_TX_ALLOWED_DELTA_SECONDS,
        max_extra_size: MAX_EXTRA_SIZE,
        min_transaction_version: MIN_TRANSACTION_VERSION,
        max_transaction_version: MAX_TRANSACTION_VERSION,
        static_reward_salt: salt.to_string(),
        versions: default_versions(second_version_index),
    }
}
