//! Protocol constants. All amounts are in base units of the distributed token.

/// Domain tag prefixed to every claim leaf before hashing.
pub const LEAF_DOMAIN: &[u8] = b"airdrop-leaf-v1";

/// Upper bound on `total_epochs` accepted at construction.
///
/// Keeps the tier table and every persisted snapshot bounded.
pub const MAX_EPOCHS: u64 = 10_000;

/// Upper bound on the number of tiers in a single row.
pub const MAX_TIERS: usize = 256;

/// Basis-point precision for decay schedules (10,000 = 100%).
pub const BPS_PRECISION: u64 = 10_000;

/// Delay before an epoch wakeup whose state could not be persisted fires again.
pub const STORAGE_RETRY_SECS: u64 = 30;

/// Current schema version of the persisted campaign snapshot.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Default JSON-RPC port of the campaign host.
pub const DEFAULT_RPC_PORT: u16 = 28_650;

/// Default token label used when a parameter file names none.
pub const DEFAULT_TOKEN_NAME: &str = "AIRDROP";
