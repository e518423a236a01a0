//! Shared fixtures: deterministic accounts and an in-memory chain

#![allow(dead_code)]

use cryptonote_consensus::crypto::generate_deterministic_keys;
use cryptonote_consensus::transaction::{GlobalOutput, InputKeyInfo, RealOutput};
use cryptonote_consensus::validator::{OutputLookup, ResolvedOutput};
use cryptonote_consensus::*;
use std::collections::{HashMap, HashSet};

pub const RING_AMOUNT: u64 = 70_000;

/// Chain state held in memory, outputs bucketed by amount and global index
#[derive(Debug, Default)]
pub struct MemoryChain {
    pub top: BlockHeight,
    pub spent: HashSet<KeyImage>,
    pub outputs: HashMap<u64, Vec<OutputLookup>>,
}

impl MemoryChain {
    pub fn with_top_index(index: u32) -> Self {
        MemoryChain {
            top: BlockHeight::from_index(index),
            ..MemoryChain::default()
        }
    }

    /// Appends an output to its amount bucket, returning its global index
    pub fn push_output(&mut self, amount: u64, position: BlockHeight, key: PublicKey, unlock_time: u64) -> u32 {
        let bucket = self.outputs.entry(amount).or_default();
        bucket.push(OutputLookup::Resolved(ResolvedOutput {
            position,
            key,
            unlock_time,
        }));
        (bucket.len() - 1) as u32
    }
}

impl ChainView for MemoryChain {
    fn top_index(&self) -> Result<BlockHeight> {
        Ok(self.top)
    }

    fn is_key_image_spent(&self, key_image: &KeyImage) -> Result<bool> {
        Ok(self.spent.contains(key_image))
    }

    fn resolve_outputs(&self, amount: u64, global_indexes: &[u32]) -> Result<Vec<OutputLookup>> {
        let bucket = self.outputs.get(&amount);
        Ok(global_indexes
            .iter()
            .map(|&index| {
                bucket
                    .and_then(|outputs| outputs.get(index as usize))
                    .cloned()
                    .unwrap_or(OutputLookup::Unknown)
            })
            .collect())
    }
}

/// Chain view whose storage is unavailable
pub struct BrokenChain;

impl ChainView for BrokenChain {
    fn top_index(&self) -> Result<BlockHeight> {
        Err(ConsensusError::ChainView("storage offline".to_string()))
    }

    fn is_key_image_spent(&self, _key_image: &KeyImage) -> Result<bool> {
        Err(ConsensusError::ChainView("storage offline".to_string()))
    }

    fn resolve_outputs(&self, _amount: u64, _global_indexes: &[u32]) -> Result<Vec<OutputLookup>> {
        Err(ConsensusError::ChainView("storage offline".to_string()))
    }
}

/// Routes crate logs to the test harness, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn account(seed: &str) -> AccountKeys {
    let spend = generate_deterministic_keys(format!("{}/spend", seed).as_bytes());
    let view = generate_deterministic_keys(format!("{}/view", seed).as_bytes());
    AccountKeys {
        address: AccountPublicAddress {
            spend_public_key: spend.public_key,
            view_public_key: view.public_key,
        },
        spend_secret_key: spend.secret_key,
        view_secret_key: view.secret_key,
    }
}

pub fn currency(network: NetworkType) -> Currency {
    Currency::new(ConsensusParameters::for_network(network).expect("network defaults are valid"))
}

/// A chain holding `mixin + 1` outputs of `RING_AMOUNT`, one of them owned by `owner`
pub struct Funded {
    pub chain: MemoryChain,
    pub info: InputKeyInfo,
}

pub fn funded(owner: &AccountKeys, mixin: usize, real_unlock_time: u64) -> Funded {
    let mut chain = MemoryChain::with_top_index(100);

    let funding_keys = generate_deterministic_keys(b"funding transaction");
    let mut funding = TransactionBuilder::with_key_pair(funding_keys);
    funding.add_output(RING_AMOUNT, &owner.address).expect("funding output");
    let real_key = funding.transaction().outputs[0].key;

    let real_position = mixin / 2;
    let mut outputs = Vec::new();
    for i in 0..=mixin {
        let (key, unlock_time) = if i == real_position {
            (real_key, real_unlock_time)
        } else {
            let seed = format!("decoy-{}", i);
            (generate_deterministic_keys(seed.as_bytes()).public_key, 0)
        };
        let position = BlockHeight::from_index(10 + i as u32);
        let output_index = chain.push_output(RING_AMOUNT, position, key, unlock_time);
        outputs.push(GlobalOutput {
            output_index,
            target_key: key,
        });
    }

    Funded {
        chain,
        info: InputKeyInfo {
            amount: RING_AMOUNT,
            outputs,
            real_output: RealOutput {
                transaction_public_key: funding_keys.public_key,
                transaction_index: real_position,
                output_in_transaction: 0,
            },
        },
    }
}

/// Signed transaction spending the funded output, paying `amount` to a recipient
pub fn signed_spend(owner: &AccountKeys, info: &InputKeyInfo, amount: u64, unlock_time: u64) -> CachedTransaction {
    let mut builder = TransactionBuilder::with_key_pair(generate_deterministic_keys(b"spending transaction"));
    builder.set_unlock_time(unlock_time).expect("unsigned");
    let (index, ephemeral) = builder.add_input(owner, info).expect("owned input");
    builder.add_output(amount, &account("recipient").address).expect("output");
    builder.sign_input_key(index, info, &ephemeral).expect("signature");
    CachedTransaction::new(builder.into_transaction())
}
