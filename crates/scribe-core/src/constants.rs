//! Default parameters. Monetary values are in minor units of the
//! StrongHands ledger (1 SHND = 10^6 minor units) unless a network says
//! otherwise.

/// Minor units per coin on the default network.
pub const COIN: u64 = 1_000_000;

/// Length of a pay-to-pubkey-hash commitment in bytes.
pub const PUBKEY_HASH_LEN: usize = 20;

/// Default framed chunk size in bytes (the classic `OP_RETURN` limit).
pub const DEFAULT_CHUNK_SIZE: usize = 80;

/// Base fee per started kilobyte of chunk payload (0.01 coin).
pub const DEFAULT_BASE_RATE_PER_KB: u64 = COIN / 100;

/// Linear multiplier applied on top of the base rate.
pub const DEFAULT_FEE_MULTIPLIER: u64 = 1;

/// Value attached to each data-carrying or pseudo-address output (0.01 coin).
pub const DEFAULT_PER_OUTPUT_FEE: u64 = COIN / 100;

/// Highest acceptable `inputs - outputs` for a single transaction.
///
/// We should never be paying more than 5 coins in fees.
pub const DEFAULT_HIGHWAY_ROBBERY_CAP: u64 = 5 * COIN;

/// Spendable balance count at or above which no new split outputs are made.
pub const DEFAULT_CONSOLIDATION_THRESHOLD: usize = 15;

/// Maximum number of fixed-size change outputs created in one transaction.
pub const DEFAULT_MAX_SPLIT_OUTPUTS: usize = 20;

/// Value of one fixed-size change output (100 coins).
pub const DEFAULT_CHANGE_SIZE: u64 = 100 * COIN;

/// Required output value above which inputs are taken largest-first.
pub const DEFAULT_LARGE_SPEND_THRESHOLD: u64 = 100 * COIN;

/// Transaction version written by the assembler.
pub const TX_VERSION: i32 = 1;

/// Minimum confirmations passed to `listunspent`; zero includes our own
/// unconfirmed change so consecutive chunks can chain.
pub const LIST_UNSPENT_MIN_CONF: u32 = 0;

/// Maximum confirmations passed to `listunspent`.
pub const LIST_UNSPENT_MAX_CONF: u32 = 9_999_999;
