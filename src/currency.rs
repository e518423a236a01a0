//! Consensus rules of one network
//!
//! [`Currency`] binds a validated [`ConsensusParameters`] to a hash oracle and
//! derives everything the rest of the node asks about money and time: block
//! rewards, static rewards, fusion classification, unlock semantics,
//! difficulty and the genesis block.

use crate::block::CachedBlock;
use crate::cached_transaction::transaction_hash;
use crate::constants::STATIC_REWARD_MAX_OUTPUTS;
use crate::crypto::generate_deterministic_keys;
use crate::economic::{self, decompose_amount, decompose_amount_capped, get_penalized_amount};
use crate::error::{ConsensusError, DecodeError, Result, ValidationError};
use crate::parameters::{ConsensusParameters, VersionParameters};
use crate::pow::{HashOracle, Sha256Oracle};
use crate::serialization::from_binary_array;
use crate::transaction::TransactionWriter;
use crate::transaction_builder::TransactionBuilder;
use crate::types::*;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of a block reward computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReward {
    /// Amount the coinbase may claim: cut base reward plus penalized fee
    pub reward: u64,
    /// Change of the circulating supply caused by the block
    pub emission_change: i64,
}

#[derive(Debug, Clone)]
struct GenesisBlock {
    block: BlockTemplate,
    hash: Hash,
}

/// Consensus rules of one network
pub struct Currency {
    params: ConsensusParameters,
    oracle: Arc<dyn HashOracle>,
    genesis: OnceCell<GenesisBlock>,
}

impl std::fmt::Debug for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Currency")
            .field("network", &self.params.network())
            .field("genesis_built", &self.genesis.get().is_some())
            .finish()
    }
}

impl Currency {
    /// Rules backed by the default SHA-256 oracle
    pub fn new(params: ConsensusParameters) -> Self {
        Self::with_oracle(params, Arc::new(Sha256Oracle))
    }

    pub fn with_oracle(params: ConsensusParameters, oracle: Arc<dyn HashOracle>) -> Self {
        Currency {
            params,
            oracle,
            genesis: OnceCell::new(),
        }
    }

    pub fn params(&self) -> &ConsensusParameters {
        &self.params
    }

    pub fn network(&self) -> NetworkType {
        self.params.network()
    }

    pub fn oracle(&self) -> &dyn HashOracle {
        self.oracle.as_ref()
    }

    fn version(&self, block_major_version: u8) -> &VersionParameters {
        self.params.version(block_major_version)
    }

    // ============================================================================
    // GENESIS
    // ============================================================================

    /// Genesis block, built on first access and kept for the lifetime of `self`
    pub fn genesis_block(&self) -> Result<&BlockTemplate> {
        Ok(&self.genesis()?.block)
    }

    pub fn genesis_hash(&self) -> Result<Hash> {
        Ok(self.genesis()?.hash)
    }

    fn genesis(&self) -> Result<&GenesisBlock> {
        self.genesis.get_or_try_init(|| self.build_genesis())
    }

    /// BuildGenesis
    ///
    /// 1. Decode the hard-coded coinbase of the network
    /// 2. Header fields come from the parameters; off mainnet the nonce is
    ///    seeded from the network id so every network has its own genesis
    /// 3. Commit to the static reward when the first version enables it
    /// 4. Advance the nonce until the block passes difficulty 1
    fn build_genesis(&self) -> Result<GenesisBlock> {
        let blob = hex::decode(self.params.genesis_coinbase())
            .map_err(|e| ConsensusError::Decode(DecodeError::InvalidHex(e.to_string())))?;
        let base_transaction = from_binary_array::<Transaction>(&blob)?;

        let major_version = self.params.versions().first().map(|entry| entry.version).unwrap_or(1);
        let mut block = BlockTemplate {
            major_version,
            minor_version: self.params.genesis_minor_version(),
            timestamp: self.params.genesis_timestamp(),
            previous_block_hash: NULL_HASH,
            nonce: 0,
            static_reward_hash: None,
            base_transaction,
            transaction_hashes: Vec::new(),
        };
        if !self.params.network().is_main_net() {
            block.nonce = u32::from(self.params.network().id()) * 0xFFFF;
        }
        block.static_reward_hash = self.static_reward_hash(&NULL_HASH, major_version, 0)?;

        let start = block.nonce;
        loop {
            let cached = CachedBlock::new(block.clone());
            if cached.check_proof_of_work(self.oracle(), 1) {
                let hash = cached.block_hash();
                debug!(
                    network = %self.params.network(),
                    nonce = block.nonce,
                    hash = %hex::encode(hash),
                    "genesis block constructed"
                );
                return Ok(GenesisBlock { block, hash });
            }
            trace!(nonce = block.nonce, "genesis nonce rejected");
            block.nonce = block.nonce.wrapping_add(1);
            if block.nonce == start {
                return Err(ConsensusError::Crypto("no genesis nonce satisfies difficulty 1".to_string()));
            }
        }
    }

    // ============================================================================
    // BLOCK REWARD
    // ============================================================================

    /// GetBlockReward
    ///
    /// 1. `base = (supply − generated) >> shift`, or the genesis reward for the first block
    /// 2. Reject blocks larger than `2 × max(median, full_reward_zone)`
    /// 3. Penalize the base reward (and, where enabled, the fee) for size above the median
    /// 4. Cut the low digits of the penalized base reward
    /// 5. `reward = cut + penalized_fee`,
    ///    `emission_change = cut + static_reward − (fee − penalized_fee)`
    pub fn get_block_reward(
        &self,
        block_major_version: u8,
        median_size: u64,
        current_block_size: u64,
        already_generated_coins: u64,
        fee: u64,
    ) -> Result<BlockReward> {
        let version = self.version(block_major_version);

        let base_reward = if already_generated_coins == 0 && self.params.genesis_block_reward() != 0 {
            self.params.genesis_block_reward()
        } else {
            self.params
                .money_supply()
                .saturating_sub(already_generated_coins)
                .checked_shr(self.params.emission_speed_shift())
                .unwrap_or(0)
        };

        let median = median_size.max(version.reward.full_reward_zone);
        if current_block_size > median.saturating_mul(2) {
            trace!(
                current_block_size,
                limit = median.saturating_mul(2),
                "block cumulative size is too big"
            );
            return Err(ValidationError::BlockCumulativeSizeTooBig.into());
        }

        let penalized_base_reward = get_penalized_amount(base_reward, median, current_block_size);
        let penalized_fee = if version.reward.penalize_fee {
            get_penalized_amount(fee, median, current_block_size)
        } else {
            fee
        };
        let cut_reward = economic::cut_low_digits(penalized_base_reward, version.reward.cutoff_digits);
        let static_reward = self.static_reward_amount(block_major_version);

        let emission_change = i128::from(cut_reward) + i128::from(static_reward) - i128::from(fee - penalized_fee);
        let reward = cut_reward
            .checked_add(penalized_fee)
            .ok_or(ValidationError::OutputsAmountOverflow)?;

        trace!(
            base_reward,
            penalized_base_reward,
            cut_reward,
            penalized_fee,
            static_reward,
            "block reward computed"
        );
        Ok(BlockReward {
            reward,
            emission_change: emission_change.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
        })
    }

    /// Coinbase of a new block
    ///
    /// The reward is split into canonical denominations, at most `max_outs`
    /// outputs, and unlocks `mined_money_unlock_window` blocks later.
    #[allow(clippy::too_many_arguments)]
    pub fn construct_miner_tx(
        &self,
        block_major_version: u8,
        block_index: u32,
        median_size: u64,
        already_generated_coins: u64,
        current_block_size: u64,
        fee: u64,
        miner_address: &AccountPublicAddress,
        extra_nonce: &[u8],
        max_outs: usize,
    ) -> Result<Transaction> {
        if max_outs == 0 {
            return Err(ConsensusError::Configuration(
                "miner transaction needs at least one output".to_string(),
            ));
        }
        let reward = self
            .get_block_reward(
                block_major_version,
                median_size,
                current_block_size,
                already_generated_coins,
                fee,
            )?
            .reward;

        let mut builder = TransactionBuilder::new();
        if !extra_nonce.is_empty() {
            builder.add_extra_nonce(extra_nonce)?;
        }
        builder.add_base_input(block_index)?;
        for amount in decompose_amount_capped(reward, max_outs)? {
            builder.add_output(amount, miner_address)?;
        }
        builder.set_unlock_time(u64::from(block_index) + u64::from(self.params.mined_money_unlock_window()))?;
        Ok(builder.into_transaction())
    }

    // ============================================================================
    // STATIC REWARD
    // ============================================================================

    /// Static reward paid by blocks of a version; zero when disabled
    pub fn static_reward_amount(&self, block_major_version: u8) -> u64 {
        let reward = &self.version(block_major_version).static_reward;
        if reward.is_enabled() {
            reward.amount
        } else {
            0
        }
    }

    pub fn static_reward_address(&self, block_major_version: u8) -> Option<AccountPublicAddress> {
        let reward = &self.version(block_major_version).static_reward;
        if reward.is_enabled() {
            reward.address
        } else {
            None
        }
    }

    /// Static reward transaction of the block following `previous_block_hash`
    ///
    /// Keys derive from the network salt and the previous block hash, so every
    /// node builds the identical transaction. Returns `Ok(None)` when the
    /// version pays no static reward.
    pub fn construct_static_reward_tx(
        &self,
        previous_block_hash: &Hash,
        block_major_version: u8,
        block_index: u32,
    ) -> Result<Option<Transaction>> {
        let reward = &self.version(block_major_version).static_reward;
        // amount and address are configured together or not at all
        let address = match reward.address {
            Some(address) if reward.amount > 0 => address,
            _ => return Ok(None),
        };

        let mut seed = Vec::with_capacity(self.params.static_reward_salt().len() + 32);
        seed.extend_from_slice(self.params.static_reward_salt().as_bytes());
        seed.extend_from_slice(previous_block_hash);
        let mut builder = TransactionBuilder::with_key_pair(generate_deterministic_keys(&seed));

        builder.add_base_input(block_index)?;
        for amount in decompose_amount_capped(reward.amount, STATIC_REWARD_MAX_OUTPUTS)? {
            builder.add_output(amount, &address)?;
        }
        builder.set_unlock_time(0)?;
        Ok(Some(builder.into_transaction()))
    }

    /// Commitment placed in the block header when a static reward is paid
    pub fn static_reward_hash(
        &self,
        previous_block_hash: &Hash,
        block_major_version: u8,
        block_index: u32,
    ) -> Result<Option<Hash>> {
        Ok(self
            .construct_static_reward_tx(previous_block_hash, block_major_version, block_index)?
            .map(|tx| transaction_hash(&tx)))
    }

    // ============================================================================
    // SIZES AND FUSION
    // ============================================================================

    /// `initial + index × numerator / denominator`
    pub fn max_block_cumulative_size(&self, index: u32) -> u64 {
        let growth = u128::from(index) * u128::from(self.params.max_block_size_growth_numerator())
            / u128::from(self.params.max_block_size_growth_denominator());
        let size = u128::from(self.params.max_block_size_initial()) + growth;
        size.min(u128::from(u64::MAX)) as u64
    }

    /// Largest transaction a block of this version accepts
    pub fn max_tx_size(&self, block_major_version: u8) -> u64 {
        let zone = self.version(block_major_version).reward.full_reward_zone;
        zone.min(self.params.max_transaction_size())
            .saturating_sub(self.params.miner_tx_blob_reserved_size())
    }

    pub fn fusion_tx_max_size(&self, block_major_version: u8) -> u64 {
        let version = self.version(block_major_version);
        version
            .fusion
            .max_size
            .min(version.reward.full_reward_zone)
            .saturating_sub(self.params.miner_tx_blob_reserved_size())
    }

    pub fn block_granted_full_reward_zone(&self, block_major_version: u8) -> u64 {
        self.version(block_major_version).reward.full_reward_zone
    }

    /// IsFusionTransaction
    ///
    /// 1. `size ≤ fusion_tx_max_size`
    /// 2. At least `min_input_count` inputs, all key inputs
    /// 3. `inputs ≥ outputs × min_in_out_count_ratio`
    /// 4. No input is below the fusion dust threshold
    /// 5. The output amounts are exactly the canonical decomposition of Σ inputs
    pub fn is_fusion_transaction(&self, tx: &Transaction, size: u64, block_major_version: u8) -> bool {
        let fusion = &self.version(block_major_version).fusion;

        if size > self.fusion_tx_max_size(block_major_version) {
            return false;
        }
        if tx.inputs.len() < fusion.min_input_count {
            return false;
        }
        if tx.inputs.len() < tx.outputs.len().saturating_mul(fusion.min_in_out_count_ratio) {
            return false;
        }

        let mut input_amount: u64 = 0;
        for input in &tx.inputs {
            let amount = match input {
                TransactionInput::Key(key) => key.amount,
                TransactionInput::Base(_) => return false,
            };
            if amount < fusion.dust_threshold {
                return false;
            }
            input_amount = match input_amount.checked_add(amount) {
                Some(sum) => sum,
                None => return false,
            };
        }

        let mut output_amounts: Vec<u64> = tx.outputs.iter().map(|output| output.amount).collect();
        output_amounts.sort_unstable();
        output_amounts == decompose_amount(input_amount)
    }

    /// IsAmountApplicableInFusionTransactionInput
    ///
    /// An output is worth fusing when it is a canonical denomination below
    /// `threshold` and not below the fusion dust threshold. Returns the
    /// power of ten of the denomination.
    pub fn fusion_input_power_of_ten(&self, amount: u64, threshold: u64, block_major_version: u8) -> Option<u8> {
        if amount >= threshold || amount < self.version(block_major_version).fusion.dust_threshold {
            return None;
        }
        if !economic::is_canonical_amount(amount) {
            return None;
        }
        let mut power = 0u8;
        let mut rest = amount;
        while rest >= 10 {
            rest /= 10;
            power += 1;
        }
        Some(power)
    }

    // ============================================================================
    // UNLOCK TIME
    // ============================================================================

    /// Unlock values up to `max_block_number` are block indexes
    pub fn is_locked_based_on_block_index(&self, unlock_time: u64) -> bool {
        unlock_time <= u64::from(self.params.max_block_number())
    }

    pub fn is_locked_based_on_timestamp(&self, unlock_time: u64) -> bool {
        !self.is_locked_based_on_block_index(unlock_time)
    }

    /// IsUnlockSatisfied
    ///
    /// Index mode: `unlock ≤ current_index + delta_blocks`.
    /// Timestamp mode: `unlock ≤ current_time + delta_seconds`.
    pub fn is_unlock_satisfied(&self, unlock_time: u64, current_index: u32, current_time: u64) -> bool {
        if self.is_locked_based_on_block_index(unlock_time) {
            unlock_time <= u64::from(current_index) + u64::from(self.params.locked_tx_allowed_delta_blocks())
        } else {
            unlock_time <= current_time.saturating_add(self.params.locked_tx_allowed_delta_seconds())
        }
    }

    /// Approximate block index at which an unlock value is reached
    ///
    /// Timestamp unlocks are converted with the target block time counted
    /// from the genesis timestamp. Only for scheduling, never for consensus.
    pub fn estimate_unlock_index(&self, unlock_time: u64) -> u32 {
        if self.is_locked_based_on_block_index(unlock_time) {
            return unlock_time as u32;
        }
        let elapsed = unlock_time.saturating_sub(self.params.genesis_timestamp());
        let index = elapsed / self.params.difficulty_target();
        u32::try_from(index).unwrap_or(u32::MAX)
    }

    // ============================================================================
    // MIXIN
    // ============================================================================

    pub fn minimum_mixin(&self, block_major_version: u8) -> u8 {
        self.version(block_major_version).mixin.minimum
    }

    pub fn maximum_mixin(&self, block_major_version: u8) -> u8 {
        self.version(block_major_version).mixin.maximum
    }

    pub fn required_mixin(&self, block_major_version: u8) -> u8 {
        self.version(block_major_version).mixin.required
    }

    /// Mixable outputs that must exist before the required mixin applies
    pub fn required_mixin_threshold(&self, block_major_version: u8) -> u64 {
        self.version(block_major_version).mixin.required_threshold
    }

    // ============================================================================
    // DIFFICULTY AND PROOF OF WORK
    // ============================================================================

    /// Samples `next_difficulty` needs: window + 1
    pub fn difficulty_blocks_count(&self, block_major_version: u8) -> usize {
        self.version(block_major_version).difficulty.window + 1
    }

    /// Next difficulty from the most recent timestamps and cumulative
    /// difficulties, oldest first; extra leading samples are ignored
    ///
    /// Panics if fewer than `difficulty_blocks_count` samples are supplied.
    pub fn next_difficulty(&self, block_major_version: u8, timestamps: &[u64], cumulative_difficulties: &[u64]) -> u64 {
        let difficulty = &self.version(block_major_version).difficulty;
        let count = difficulty.window + 1;
        let timestamps = &timestamps[timestamps.len().saturating_sub(count)..];
        let cumulative_difficulties = &cumulative_difficulties[cumulative_difficulties.len().saturating_sub(count)..];
        difficulty.algorithm.next_difficulty(
            timestamps,
            cumulative_difficulties,
            difficulty.window,
            self.params.difficulty_target(),
        )
    }

    /// Difficulty of the first blocks, before a full window exists
    pub fn initial_difficulty(&self, block_major_version: u8) -> u64 {
        self.version(block_major_version).difficulty.initial
    }

    pub fn check_proof_of_work(&self, block: &CachedBlock, difficulty: u64) -> bool {
        block.check_proof_of_work(self.oracle(), difficulty)
    }

    /// Major version a block at `index` must carry
    pub fn block_version_for_index(&self, index: u32) -> u8 {
        self.params.version_at_index(index).version
    }

    /// Blocks whose median timestamp bounds a new block from below
    pub fn timestamp_check_window(&self, block_major_version: u8) -> usize {
        self.version(block_major_version).time.past_window
    }

    pub fn block_future_time_limit(&self, block_major_version: u8) -> u64 {
        self.version(block_major_version).time.future_limit
    }

    // ============================================================================
    // AMOUNTS
    // ============================================================================

    pub fn minimum_fee(&self) -> u64 {
        self.params.minimum_fee()
    }

    pub fn format_amount(&self, amount: u64) -> String {
        economic::format_amount(amount, self.params.decimal_places())
    }

    pub fn parse_amount(&self, text: &str) -> Option<u64> {
        economic::parse_amount(text, self.params.decimal_places())
    }
}
