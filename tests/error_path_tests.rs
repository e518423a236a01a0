//! Tests for error paths and edge cases

mod common;

use common::*;
use cryptonote_consensus::crypto::generate_deterministic_keys;
use cryptonote_consensus::*;
use std::collections::HashSet;

fn rejection(result: Result<EligibleIndex>) -> ValidationError {
    result
        .expect_err("transaction should be rejected")
        .rejection()
        .expect("ordinary rejection")
}

fn tampered(tx: &CachedTransaction, change: impl FnOnce(&mut Transaction)) -> CachedTransaction {
    let mut transaction = tx.transaction().clone();
    change(&mut transaction);
    CachedTransaction::new(transaction)
}

#[test]
fn test_chain_failure_propagates() {
    let owner = account("owner");
    let Funded { info, .. } = funded(&owner, 2, 0);
    let currency = currency(NetworkType::MainNet);
    let tx = signed_spend(&owner, &info, RING_AMOUNT - 1_000, 0);

    let err = TransactionValidator::new(1, &BrokenChain, &currency)
        .validate(&tx)
        .unwrap_err();
    assert_eq!(err, ConsensusError::ChainView("storage offline".to_string()));
    assert_eq!(err.rejection(), None);

    let pool: HashSet<Hash> = HashSet::new();
    let validator = TransactionValidator::new(1, &BrokenChain, &currency);
    let err = PoolTransactionValidator::new(validator, &pool, 0)
        .validate(&tx)
        .unwrap_err();
    assert!(matches!(err, ConsensusError::ChainView(_)));
}

#[test]
fn test_structural_rules_run_before_chain_queries() {
    let owner = account("owner");
    let Funded { chain, info } = funded(&owner, 2, 0);
    let currency = currency(NetworkType::MainNet);
    let tx = signed_spend(&owner, &info, RING_AMOUNT - 1_000, 0);

    let future_version = tampered(&tx, |t| t.version = 9);
    let offline = TransactionValidator::new(1, &BrokenChain, &currency);
    assert_eq!(rejection(offline.validate(&future_version)), ValidationError::InvalidVersion);

    let zero_output = tampered(&tx, |t| t.outputs[0].amount = 0);
    assert_eq!(rejection(offline.validate(&zero_output)), ValidationError::OutputZeroAmount);

    // Policy rules come after the spent check and need a working chain
    let no_extra = tampered(&tx, |t| t.extra.clear());
    assert!(matches!(offline.validate(&no_extra), Err(ConsensusError::ChainView(_))));

    let validator = TransactionValidator::new(1, &chain, &currency);
    assert_eq!(rejection(validator.validate(&no_extra)), ValidationError::ExtraMissingPublicKey);

    let no_signatures = tampered(&tx, |t| t.signatures.clear());
    assert_eq!(
        rejection(validator.validate(&no_signatures)),
        ValidationError::InputWrongSignaturesCount
    );
}

#[test]
fn test_oversized_transactions() {
    let owner = account("owner");
    let Funded { chain, info } = funded(&owner, 2, 0);
    let currency = currency(NetworkType::MainNet);
    let tx = signed_spend(&owner, &info, RING_AMOUNT - 1_000, 0);

    let huge = tampered(&tx, |t| t.extra.resize(1_000_001, 0));
    let validator = TransactionValidator::new(1, &chain, &currency);
    assert_eq!(rejection(validator.validate(&huge)), ValidationError::TooLarge);

    // Above the reward zone budget but below the absolute limit
    let bulky = tampered(&tx, |t| t.extra.resize(100_000, 0));
    assert!(bulky.blob_size() > currency.max_tx_size(1));
    assert!(bulky.blob_size() <= currency.params().max_transaction_size());

    let pool: HashSet<Hash> = HashSet::new();
    let pool_validator = PoolTransactionValidator::new(validator, &pool, 0);
    assert_eq!(
        rejection(pool_validator.validate(&bulky)),
        ValidationError::TooLargeForRewardZone
    );
}

#[test]
fn test_pool_rejects_known_transaction() {
    let owner = account("owner");
    let Funded { chain, info } = funded(&owner, 2, 0);
    let currency = currency(NetworkType::MainNet);
    let tx = signed_spend(&owner, &info, RING_AMOUNT - 1_000, 0);

    let mut pool = HashSet::new();
    pool.insert(tx.transaction_hash());
    let validator = TransactionValidator::new(1, &chain, &currency);
    let pool_validator = PoolTransactionValidator::new(validator, &pool, 0);
    assert_eq!(rejection(pool_validator.validate(&tx)), ValidationError::ExistsInPool);

    let empty: HashSet<Hash> = HashSet::new();
    let validator = TransactionValidator::new(1, &chain, &currency);
    assert!(PoolTransactionValidator::new(validator, &empty, 0).validate(&tx).is_ok());
}

#[test]
fn test_undecodable_blob() {
    let Funded { chain, .. } = funded(&account("owner"), 2, 0);
    let currency = currency(NetworkType::MainNet);
    let validator = TransactionValidator::new(1, &chain, &currency);

    let err = validator.validate_blob(&[0x01, 0x00, 0xff]).unwrap_err();
    assert_eq!(err.rejection(), Some(ValidationError::InvalidBinaryRepresentation));
    assert!(validator.validate_blob(&[]).is_err());
}

#[test]
fn test_padded_encoding_cannot_change_txid() {
    let owner = account("owner");
    let Funded { chain, info } = funded(&owner, 2, 0);
    let currency = currency(NetworkType::MainNet);
    let validator = TransactionValidator::new(1, &chain, &currency);
    let tx = signed_spend(&owner, &info, RING_AMOUNT - 1_000, 0);

    let blob = tx.transaction_binary_array().to_vec();
    let (decoded, _) = validator.validate_blob(&blob).expect("canonical blob validates");
    assert_eq!(decoded.transaction_hash(), tx.transaction_hash());

    // version 1, unlock time 0 written as 0x80 0x00
    assert_eq!(&blob[..2], &[0x01, 0x00]);
    let mut padded = vec![0x01, 0x80, 0x00];
    padded.extend_from_slice(&blob[2..]);

    let err = validator.validate_blob(&padded).unwrap_err();
    assert_eq!(err.rejection(), Some(ValidationError::InvalidBinaryRepresentation));
    assert!(CachedTransaction::from_binary_array(&padded).is_err());
}

#[test]
fn test_oversized_block_has_no_reward() {
    let currency = currency(NetworkType::MainNet);
    let zone = currency.block_granted_full_reward_zone(1);

    assert!(currency.get_block_reward(1, 0, 2 * zone, 1, 0).is_ok());
    let err = currency.get_block_reward(1, 0, 2 * zone + 1, 1, 0).unwrap_err();
    assert_eq!(err, ConsensusError::Rejected(ValidationError::BlockCumulativeSizeTooBig));

    let median = 3 * zone;
    assert!(currency.get_block_reward(1, median, 2 * median, 1, 0).is_ok());
    assert!(currency.get_block_reward(1, median, 2 * median + 1, 1, 0).is_err());
}

#[test]
fn test_invalid_configurations() {
    let cases = vec![
        ConsensusParametersBuilder::new(NetworkType::MainNet).emission_speed_shift(0),
        ConsensusParametersBuilder::new(NetworkType::MainNet).emission_speed_shift(65),
        ConsensusParametersBuilder::new(NetworkType::MainNet).decimal_places(20),
        ConsensusParametersBuilder::new(NetworkType::MainNet).difficulty_target(0),
        ConsensusParametersBuilder::new(NetworkType::MainNet).max_block_size(1_000, 1, 0),
        ConsensusParametersBuilder::new(NetworkType::MainNet).genesis_coinbase(""),
        ConsensusParametersBuilder::new(NetworkType::MainNet).versions(Vec::new()),
        ConsensusParametersBuilder::new(NetworkType::MainNet).update_versions(|entry| entry.activation_index = 0),
        ConsensusParametersBuilder::new(NetworkType::MainNet).update_versions(|entry| {
            entry.static_reward.amount = 0;
            entry.static_reward.address = Some(account("static").address);
        }),
    ];
    for builder in cases {
        assert!(matches!(builder.build(), Err(ConsensusError::Configuration(_))));
    }

    assert!(matches!(
        ConsensusParameters::from_json("{ not json"),
        Err(ConsensusError::Configuration(_))
    ));
}

#[test]
fn test_deserialization_validates_parameters() {
    let params = ConsensusParameters::for_network(NetworkType::TestNet).unwrap();
    let valid: serde_json::Value = serde_json::from_str(&params.to_json().unwrap()).unwrap();

    let mut empty_table = valid.clone();
    empty_table["versions"] = serde_json::json!([]);
    let mut no_growth = valid.clone();
    no_growth["max_block_size_growth_denominator"] = serde_json::json!(0);

    for broken in [empty_table, no_growth] {
        assert!(serde_json::from_value::<ConsensusParameters>(broken.clone()).is_err());
        assert!(matches!(
            ConsensusParameters::from_json(&broken.to_string()),
            Err(ConsensusError::Configuration(_))
        ));
    }

    let reloaded: ConsensusParameters = serde_json::from_value(valid).unwrap();
    assert_eq!(reloaded, params);
    assert_eq!(Currency::new(reloaded).block_version_for_index(1), 1);
}

#[test]
fn test_malformed_genesis_coinbase() {
    let params = ConsensusParametersBuilder::new(NetworkType::TestNet)
        .genesis_coinbase("not hex")
        .build()
        .unwrap();
    let currency = Currency::new(params);
    assert!(matches!(
        currency.genesis_hash(),
        Err(ConsensusError::Decode(DecodeError::InvalidHex(_)))
    ));

    let params = ConsensusParametersBuilder::new(NetworkType::TestNet)
        .genesis_coinbase("0100")
        .build()
        .unwrap();
    assert!(matches!(Currency::new(params).genesis_block(), Err(ConsensusError::Decode(_))));
}

#[test]
fn test_builder_errors() {
    let owner = account("owner");
    let Funded { info, .. } = funded(&owner, 2, 0);

    // Someone else cannot claim the funded output
    let mut builder = TransactionBuilder::new();
    assert!(matches!(
        builder.add_input(&account("stranger"), &info),
        Err(ConsensusError::Crypto(_))
    ));

    // The real output must be part of the ring
    let mut orphaned = info.clone();
    orphaned.real_output.transaction_index = orphaned.outputs.len();
    assert!(builder.add_input(&owner, &orphaned).is_err());

    let mut repeated = info.clone();
    repeated.outputs[0].output_index = repeated.outputs[1].output_index;
    assert_eq!(
        builder.add_input(&owner, &repeated).unwrap_err(),
        ConsensusError::Rejected(ValidationError::InputIdenticalOutputIndexes)
    );

    // Signing an input that does not exist
    let ephemeral = generate_deterministic_keys(b"ephemeral");
    assert!(matches!(
        builder.sign_input_key(3, &info, &ephemeral),
        Err(ConsensusError::Crypto(_))
    ));

    // Outputs need the transaction secret key
    let mut reloaded = TransactionBuilder::from_transaction(builder.transaction().clone());
    assert!(matches!(
        reloaded.add_output(1, &owner.address),
        Err(ConsensusError::Crypto(_))
    ));
}
