//! Consensus constants and per-network defaults

/// Number of decimal places of one coin
pub const COIN_DECIMAL_PLACES: u8 = 6;

/// Atomic units per coin
pub const COIN: u64 = 1_000_000;

/// Total money supply in atomic units: 55,000,000 coins
pub const MONEY_SUPPLY: u64 = 55_000_000 * COIN;

/// Fixed reward of the first block: 3,300,000 coins
pub const GENESIS_BLOCK_REWARD: u64 = 3_300_000 * COIN;

/// Emission speed: base reward = remaining supply >> shift
pub const EMISSION_SPEED_SHIFT: u32 = 21;

/// Minimum fee of an ordinary transaction
pub const MINIMUM_FEE: u64 = 100;

/// Target seconds between blocks
pub const DIFFICULTY_TARGET: u64 = 60;

/// Genesis block timestamp
pub const GENESIS_TIMESTAMP: u64 = 1_544_396_293;

/// Largest unlock value read as a block index; anything above is a unix timestamp
pub const MAX_BLOCK_NUMBER: u32 = 500_000_000;

/// Maximum cumulative block size at the genesis index
pub const MAX_BLOCK_SIZE_INITIAL: u64 = 200 * 1024;

/// Block size growth: 5 kB per day of blocks
pub const MAX_BLOCK_SIZE_GROWTH_NUMERATOR: u64 = 5 * 1024;
pub const MAX_BLOCK_SIZE_GROWTH_DENOMINATOR: u64 = 24 * 60 * 60 / DIFFICULTY_TARGET;

/// Hard cap on a single transaction blob
pub const MAX_TRANSACTION_SIZE: u64 = 1_000_000;

/// Space reserved for the coinbase inside the reward zone
pub const MINER_TX_BLOB_RESERVED_SIZE: u64 = 600;

/// Blocks a coinbase output stays locked
pub const MINED_MONEY_UNLOCK_WINDOW: u32 = 10;

/// Grace window when checking index-mode unlocks
pub const LOCKED_TX_ALLOWED_DELTA_BLOCKS: u32 = 1;

/// Grace window when checking timestamp-mode unlocks
pub const LOCKED_TX_ALLOWED_DELTA_SECONDS: u64 = DIFFICULTY_TARGET * LOCKED_TX_ALLOWED_DELTA_BLOCKS as u64;

/// Maximum size of the transaction extra field
pub const MAX_EXTRA_SIZE: usize = 1024;

/// Maximum size of one extra nonce
pub const MAX_EXTRA_NONCE_SIZE: usize = 255;

/// Supported transaction versions
pub const MIN_TRANSACTION_VERSION: u8 = 1;
pub const MAX_TRANSACTION_VERSION: u8 = 1;

/// Maximum number of outputs of a static reward transaction
pub const STATIC_REWARD_MAX_OUTPUTS: usize = 10;

/// Fusion transaction limits
pub const FUSION_TX_MAX_SIZE: u64 = 32 * 1024;
pub const FUSION_TX_MIN_INPUT_COUNT: usize = 12;
pub const FUSION_TX_MIN_IN_OUT_COUNT_RATIO: usize = 4;
/// Smallest input a fusion transaction may consume, zero accepts any amount
pub const FUSION_TX_DUST_THRESHOLD: u64 = 0;

/// Difficulty window of both retarget algorithms
pub const DIFFICULTY_WINDOW: usize = 60;

/// Difficulty used while the chain is shorter than the window
pub const DIFFICULTY_INITIAL: u64 = 100_000;

/// Timestamp checks of block headers
pub const BLOCK_TIMESTAMP_PAST_WINDOW: usize = 50;
pub const BLOCK_FUTURE_TIME_LIMIT: u64 = 10 * 60;

/// Maximum blocks a transaction may lock its own outputs ahead of its inclusion
pub const TRANSACTION_FUTURE_UNLOCK_LIMIT: u32 = 30 * 24 * 60;

/// Input tag of a coinbase input
pub const TX_INPUT_TAG_BASE: u8 = 0xff;

/// Input tag of a key input
pub const TX_INPUT_TAG_KEY: u8 = 0x02;

/// Output tag of a key output
pub const TX_OUTPUT_TAG_KEY: u8 = 0x02;

/// Extra field tags
pub const TX_EXTRA_TAG_PADDING: u8 = 0x00;
pub const TX_EXTRA_TAG_PUBKEY: u8 = 0x01;
pub const TX_EXTRA_TAG_NONCE: u8 = 0x02;

/// First byte of an extra nonce carrying a payment id
pub const TX_EXTRA_NONCE_PAYMENT_ID: u8 = 0x00;

/// Hard-coded genesis coinbase transactions, one per network
pub const GENESIS_COINBASE_MAINNET: &str = "010a01ff0001c0843d020279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798220102c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee500";
pub const GENESIS_COINBASE_STAGENET: &str = "010a01ff0001c0843d0202c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5220102f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f900";
pub const GENESIS_COINBASE_TESTNET: &str = "010a01ff0001c0843d0202f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f922010279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f8179800";
pub const GENESIS_COINBASE_LOCALTESTNET: &str = "010a01ff0001c0843d020279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798220102f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f900";

/// Static reward recipient: spend key 2·G, view key 3·G
pub const STATIC_REWARD_SPEND_PUBLIC_KEY: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
pub const STATIC_REWARD_VIEW_PUBLIC_KEY: &str = "02f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";

/// Static reward paid per block
pub const STATIC_REWARD_AMOUNT: u64 = COIN;
