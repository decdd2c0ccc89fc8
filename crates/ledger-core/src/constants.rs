pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Leading hex zeros a proof digest must carry.
pub const POW_DIFFICULTY: u32 = 4;
/// Candidates tried between two looks at the cancel token.
pub const MINE_CHECK_INTERVAL: u64 = 4_096;
/// Candidates per rayon batch in `mine_parallel`.
pub const MINE_BATCH_SIZE: u64 = 1 << 16;

pub const GENESIS_INDEX: u64 = 1;
pub const GENESIS_TIMESTAMP: f64 = 0.0;
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Sender used for the block reward, which has no real sender.
pub const REWARD_SENDER: &str = "0";
pub const MINING_REWARD: f64 = 1.0;

pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;
