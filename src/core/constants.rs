use ethers::types::Address;
use std::str::FromStr;

// Uniswap V3 factory (same address on mainnet and most L2s)
pub const UNISWAP_V3_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";

lazy_static::lazy_static! {
    pub static ref DEFAULT_FACTORY: Address = Address::from_str(UNISWAP_V3_FACTORY).unwrap();
}

// Swap protocol defaults
pub const SWAP_FEE_TIER: u32 = 100; // 0.01%
pub const SWAP_SLIPPAGE_BPS: u16 = 50; // 0.5%

// Liquidity protocol defaults
pub const LIQUIDITY_FEE_TIER: u32 = 100; // 0.01%
pub const LIQUIDITY_TICK_HALF_WIDTH: i32 = 100;
pub const LIQUIDITY_SLIPPAGE_BPS: u16 = 50; // 0.5%

pub const BPS_DENOMINATOR: u32 = 10_000;
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

// Transaction deadline, counted from submission
pub const TX_DEADLINE_SECS: i64 = 600;

// Receipt polling
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;

// Token metadata cache TTL in seconds
pub const TOKEN_CACHE_TTL: u64 = 3_600;

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Substrings (lowercase) that wallets put in signature-rejection errors.
pub const USER_REJECTION_PHRASES: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected the request",
    "action_rejected",
    "request rejected",
];

pub const REVERT_PHRASE: &str = "execution reverted";

/// Tick spacing enabled by the factory for each fee tier.
pub fn tick_spacing_for_fee(fee_tier: u32) -> Option<i32> {
    match fee_tier {
        100 => Some(1),
        500 => Some(10),
        3000 => Some(60),
        10000 => Some(200),
        _ => None,
    }
}
