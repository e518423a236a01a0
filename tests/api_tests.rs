//! Public API behaviour: chain positions, difficulty, parameters and transaction views

mod common;

use common::*;
use cryptonote_consensus::crypto::{fast_hash, generate_deterministic_keys};
use cryptonote_consensus::economic::decompose_amount;
use cryptonote_consensus::serialization::{from_binary_array, to_binary_array, transaction_prefix_to_binary_array};
use cryptonote_consensus::*;

// ============================================================================
// CHAIN POSITION
// ============================================================================

#[test]
fn test_index_round_trip() {
    for index in [0u32, 1, 2, 1_000, u32::MAX - 2] {
        assert_eq!(BlockHeight::from_index(index).to_index(), index);
    }
    assert!(BlockHeight::from_index(u32::MAX).is_null());
}

#[test]
fn test_advance_properties() {
    for native in [1u32, 7, u32::MAX - 2, u32::MAX - 1] {
        let mut height = BlockHeight::from_native(native);
        height.advance(0);
        assert_eq!(height, BlockHeight::from_native(native));
    }

    let mut top = BlockHeight::max();
    top.advance(1);
    assert!(top.is_null());

    let mut null = BlockHeight::NULL;
    null.advance(5);
    assert!(null.is_null());
    assert!(BlockHeight::GENESIS.shift(-1).is_null());
}

#[test]
fn test_offset_arithmetic_short_circuits_null() {
    let a = BlockHeight::from_native(50);
    let b = BlockHeight::from_native(20);
    assert_eq!(a - b, Some(BlockOffset::from_native(30)));
    assert_eq!(b + BlockOffset::from_native(30), a);
    assert_eq!(a - BlockOffset::from_native(30), b);
    assert_eq!(a - BlockHeight::NULL, None);
    assert!((BlockHeight::NULL + BlockOffset::from_native(1)).is_null());
}

#[test]
fn test_position_wire_format() {
    assert_eq!(to_binary_array(&BlockHeight::NULL), vec![0u8]);
    assert!(from_binary_array::<BlockHeight>(&[0]).unwrap().is_null());
    assert_eq!(
        from_binary_array::<BlockHeight>(&[0x05]).unwrap(),
        BlockHeight::from_native(5)
    );

    // u32::MAX as a varint: outside the valid range, never clamped
    let err = from_binary_array::<BlockHeight>(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap_err();
    assert_eq!(err, DecodeError::HeightOutOfRange(u64::from(u32::MAX)));

    assert_eq!(serde_json::to_string(&BlockHeight::NULL).unwrap(), "0");
    assert!(serde_json::from_str::<BlockHeight>("4294967295").is_err());
}

// ============================================================================
// DIFFICULTY
// ============================================================================

fn window(solve_time: u64, difficulty: u64, count: usize) -> (Vec<u64>, Vec<u64>) {
    let timestamps = (0..count as u64).map(|i| 1_000 + i * solve_time).collect();
    let cumulative = (0..count as u64).map(|i| i * difficulty).collect();
    (timestamps, cumulative)
}

#[test]
fn test_difficulty_stays_within_bounds() {
    let currency = currency(NetworkType::MainNet);
    let target = constants::DIFFICULTY_TARGET;

    for version in [1u8, 2] {
        let count = currency.difficulty_blocks_count(version);
        for solve_time in [1, target / 2, target, target * 2, target * 10] {
            let (timestamps, cumulative) = window(solve_time, 50_000, count);
            let next = currency.next_difficulty(version, &timestamps, &cumulative);
            assert!(next >= 50_000 * 67 / 100, "v{} solve {} -> {}", version, solve_time, next);
            assert!(next <= 50_000 * 150 / 100, "v{} solve {} -> {}", version, solve_time, next);
        }
    }
}

#[test]
fn test_difficulty_with_zero_and_negative_deltas() {
    let currency = currency(NetworkType::MainNet);
    let count = currency.difficulty_blocks_count(1).max(currency.difficulty_blocks_count(2));
    let timestamps: Vec<u64> = (0..count as u64).map(|i| 1_000_000 - i * 7).collect();
    let cumulative: Vec<u64> = (0..count as u64).map(|i| i * 1_000).collect();

    for version in [1u8, 2] {
        let next = currency.next_difficulty(version, &timestamps, &cumulative);
        assert!(next >= 670 && next <= 1_500);
    }
    let flat = vec![1_000u64; count];
    assert!(currency.next_difficulty(2, &flat, &cumulative) <= 1_500);
}

#[test]
#[should_panic(expected = "difficulty window")]
fn test_difficulty_short_window_panics() {
    let currency = currency(NetworkType::MainNet);
    let (timestamps, cumulative) = window(60, 1_000, 10);
    currency.next_difficulty(2, &timestamps, &cumulative);
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[test]
fn test_parameters_from_json_file_shape() {
    let params = ConsensusParameters::for_network(NetworkType::TestNet).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&params.to_json().unwrap()).unwrap();
    value["minimum_fee"] = serde_json::json!(12_345);
    value["versions"][1]["mixin"]["minimum"] = serde_json::json!(2);

    let loaded = ConsensusParameters::from_json(&value.to_string()).unwrap();
    let currency = Currency::new(loaded);
    assert_eq!(currency.minimum_fee(), 12_345);
    assert_eq!(currency.minimum_mixin(2), 2);

    value["unexpected"] = serde_json::json!(true);
    assert!(matches!(
        ConsensusParameters::from_json(&value.to_string()),
        Err(ConsensusError::Configuration(_))
    ));
}

#[test]
fn test_builder_rejects_inverted_mixin_bounds() {
    let result = ConsensusParametersBuilder::new(NetworkType::MainNet)
        .update_versions(|entry| {
            entry.mixin.minimum = 5;
            entry.mixin.maximum = 4;
        })
        .build();
    assert!(matches!(result, Err(ConsensusError::Configuration(_))));
}

// ============================================================================
// TRANSACTION VIEWS
// ============================================================================

#[test]
fn test_cached_hash_entry_points_agree() {
    let owner = account("owner");
    let Funded { info, .. } = funded(&owner, 2, 0);
    let cached = signed_spend(&owner, &info, RING_AMOUNT - 500, 0);

    let hash = cached.transaction_hash();
    assert_eq!(hash, cached.transaction_hash());
    assert_eq!(hash, fast_hash(cached.transaction_binary_array()));
    assert_eq!(hash, fast_hash(&to_binary_array(cached.transaction())));
    assert_eq!(
        cached.transaction_prefix_hash(),
        fast_hash(&transaction_prefix_to_binary_array(cached.transaction()))
    );
    assert_eq!(TransactionReader::transaction_hash(&cached), hash);
    assert_eq!(cached.fee(), Ok(500));
}

#[test]
fn test_builder_and_cached_view_agree() {
    let mut builder = TransactionBuilder::with_key_pair(generate_deterministic_keys(b"agree"));
    builder.add_output(1_000, &account("recipient").address).unwrap();
    builder.set_payment_id(&[0x11u8; 32]).unwrap();

    let reader: &dyn TransactionReader = &builder;
    let hash = reader.transaction_hash();
    let cached = CachedTransaction::new(builder.transaction().clone());
    assert_eq!(cached.transaction_hash(), hash);
    assert_eq!(cached.payment_id(), Some([0x11u8; 32]));
    assert_eq!(reader.output_total_amount(), Ok(1_000));
    assert_eq!(reader.transaction_data(), cached.transaction_binary_array());
}

#[test]
fn test_signing_lock_through_writer_trait() {
    let owner = account("owner");
    let Funded { info, .. } = funded(&owner, 1, 0);

    let mut builder = TransactionBuilder::new();
    let (index, ephemeral) = builder.add_input(&owner, &info).unwrap();
    builder.add_output(RING_AMOUNT - 100, &account("recipient").address).unwrap();

    let writer: &mut dyn TransactionWriter = &mut builder;
    writer.sign_input_key(index, &info, &ephemeral).unwrap();
    assert_eq!(writer.set_unlock_time(10), Err(ConsensusError::TransactionAlreadySigned));
    assert_eq!(writer.add_output_key(1, &ephemeral.public_key), Err(ConsensusError::TransactionAlreadySigned));
    assert!(matches!(
        writer.add_input(&owner, &info),
        Err(ConsensusError::TransactionAlreadySigned)
    ));
    assert!(matches!(
        writer.set_transaction_secret_key(&ephemeral.secret_key),
        Err(ConsensusError::TransactionAlreadySigned)
    ));
}

#[test]
fn test_fusion_classification_via_validator() {
    let currency = currency(NetworkType::MainNet);
    let inputs: Vec<u64> = (1..=12).collect();
    let sum: u64 = inputs.iter().sum();
    let key = generate_deterministic_keys(b"fusion").public_key;
    let tx = |amounts: Vec<u64>| Transaction {
        version: 1,
        inputs: inputs
            .iter()
            .enumerate()
            .map(|(i, &amount)| {
                TransactionInput::Key(KeyInput {
                    amount,
                    output_indexes: vec![i as u32],
                    key_image: KeyImage([i as u8 + 1; 33]),
                })
            })
            .collect(),
        outputs: amounts.into_iter().map(|amount| TransactionOutput { amount, key }).collect(),
        ..Transaction::default()
    };

    let canonical = decompose_amount(sum);
    assert!(currency.is_fusion_transaction(&tx(canonical.clone()), 2_000, 1));
    for i in 0..canonical.len() {
        let mut perturbed = canonical.clone();
        perturbed[i] += 1;
        assert!(!currency.is_fusion_transaction(&tx(perturbed), 2_000, 1));
    }
}
