//! # Protocol Constants
//!
//! Every magic number in INGOT lives here. These values define the
//! economics of the ledger; changing them after deployment re-prices
//! everyone's collateral, so choose wisely.
//!
//! All ratios are fixed-point integers scaled by [`SCALE`]. 100_000 means
//! 100.000% — three decimal places of percentage precision, and not a
//! floating-point number in sight.

/// Fixed-point base for every rate and ratio in the protocol.
/// 100_000 == 100.000%.
pub const SCALE: u64 = 100_000;

/// Exactly 100% collateralization. The hard floor: no operation may leave
/// outstanding supply backed by less than this.
pub const FULL_COLLATERAL_RATIO: u64 = SCALE;

/// Default required backing value per unit of primary supply minted
/// against a vault. 120_000 == 120%: every cast deposits a fifth more
/// value than it mints.
pub const DEFAULT_TARGET_COLLATERAL_RATIO: u64 = 120_000;

/// Default floor for the reward mint. Distributing accrued surplus is
/// allowed only while the aggregate ratio stays at or above 110%.
pub const DEFAULT_REWARD_FLOOR_RATIO: u64 = 110_000;

/// Decimal places of the primary token. Fixed at 18 for standard-interface
/// compatibility; the ledger itself only ever sees integer base units.
pub const TOKEN_DECIMALS: u8 = 18;

/// The account that plays the role of the contract address: it custodies
/// deposited backing assets and is the spender every burn authorization
/// is granted to.
pub const SYSTEM_ACCOUNT: &str = "ingot:reserve";
