use crate::core::{constants::tick_spacing_for_fee, AgentError, AgentResult};
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token metadata resolved from chain. Identity is (chain_id, address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl TokenDescriptor {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
        }
    }

    pub fn same_token(&self, other: &TokenDescriptor) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl fmt::Display for TokenDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.symbol, self.address)
    }
}

/// Pool state at one point in time. Never mutated; a re-fetch supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    pub token0: TokenDescriptor,
    pub token1: TokenDescriptor,
    pub fee_tier: u32,
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
}

impl PoolSnapshot {
    /// Builds a snapshot, ordering the two tokens by address.
    pub fn new(
        address: Address,
        token_a: TokenDescriptor,
        token_b: TokenDescriptor,
        fee_tier: u32,
        sqrt_price_x96: U256,
        tick: i32,
        liquidity: u128,
    ) -> AgentResult<Self> {
        if tick_spacing_for_fee(fee_tier).is_none() {
            return Err(AgentError::InvalidInput(format!(
                "Unsupported fee tier {}",
                fee_tier
            )));
        }
        if token_a.same_token(&token_b) {
            return Err(AgentError::InvalidInput(
                "Pool tokens must differ".to_string(),
            ));
        }
        if sqrt_price_x96.is_zero() {
            return Err(AgentError::InvalidInput(
                "Pool is not initialized (sqrt price is zero)".to_string(),
            ));
        }

        let (token0, token1) = sort_tokens(token_a, token_b);
        Ok(Self {
            address,
            token0,
            token1,
            fee_tier,
            sqrt_price_x96,
            tick,
            liquidity,
        })
    }

    pub fn tick_spacing(&self) -> i32 {
        // fee tier is validated in the constructor
        tick_spacing_for_fee(self.fee_tier).unwrap_or(1)
    }

    pub fn token(&self, address: Address) -> Option<&TokenDescriptor> {
        if self.token0.address == address {
            Some(&self.token0)
        } else if self.token1.address == address {
            Some(&self.token1)
        } else {
            None
        }
    }

    /// The counterpart of `address` in this pool.
    pub fn other_token(&self, address: Address) -> Option<&TokenDescriptor> {
        if self.token0.address == address {
            Some(&self.token1)
        } else if self.token1.address == address {
            Some(&self.token0)
        } else {
            None
        }
    }
}

/// Orders two tokens ascending by address.
pub fn sort_tokens(a: TokenDescriptor, b: TokenDescriptor) -> (TokenDescriptor, TokenDescriptor) {
    if a.address <= b.address {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub token_in: Address,
    pub token_out: Address,
    pub input_amount: U256,
    pub estimated_output: U256,
    pub minimum_output: U256,
    pub slippage_tolerance_bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub owner: Address,
    pub spender: Address,
    pub token: Address,
    pub amount: U256,
}

impl Allowance {
    pub fn covers(&self, required: U256) -> bool {
        self.amount >= required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Approve,
    Swap,
    AddLiquidity,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Approve => write!(f, "approve"),
            TxKind::Swap => write!(f, "swap"),
            TxKind::AddLiquidity => write!(f, "addLiquidity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationState {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: H256,
    pub kind: TxKind,
    /// Token being approved; `None` for swap and add-liquidity calls.
    pub token: Option<Address>,
    pub confirmation_state: ConfirmationState,
}

impl PendingTransaction {
    pub fn new(hash: H256, kind: TxKind, token: Option<Address>) -> Self {
        Self {
            hash,
            kind,
            token,
            confirmation_state: ConfirmationState::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    /// Human-readable amount, scaled by the input token's decimals.
    pub amount_in: String,
    pub fee_tier: Option<u32>,
    pub slippage_bps: Option<u16>,
}

impl SwapParams {
    pub fn new(token_in: Address, token_out: Address, amount_in: impl Into<String>) -> Self {
        Self {
            token_in,
            token_out,
            amount_in: amount_in.into(),
            fee_tier: None,
            slippage_bps: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityParams {
    pub token_a: Address,
    pub token_b: Address,
    pub amount_a: String,
    pub amount_b: String,
    pub fee_tier: Option<u32>,
}

impl LiquidityParams {
    pub fn new(
        token_a: Address,
        amount_a: impl Into<String>,
        token_b: Address,
        amount_b: impl Into<String>,
    ) -> Self {
        Self {
            token_a,
            token_b,
            amount_a: amount_a.into(),
            amount_b: amount_b.into(),
            fee_tier: None,
        }
    }
}

/// Everything the add-liquidity call needs, in token0/token1 order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPlan {
    pub pool: Address,
    pub token0: TokenDescriptor,
    pub token1: TokenDescriptor,
    pub fee_tier: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: U256,
    pub amount1_desired: U256,
    pub amount0: U256,
    pub amount1: U256,
    pub amount0_min: U256,
    pub amount1_min: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(byte: u8, symbol: &str) -> TokenDescriptor {
        TokenDescriptor::new(1, Address::repeat_byte(byte), 18, symbol)
    }

    #[test]
    fn test_snapshot_orders_tokens_by_address() {
        let high = token(0xbb, "HIGH");
        let low = token(0x11, "LOW");
        let pool = PoolSnapshot::new(
            Address::repeat_byte(0x99),
            high.clone(),
            low.clone(),
            100,
            U256::from(1u128 << 96),
            0,
            1_000,
        )
        .unwrap();

        assert_eq!(pool.token0, low);
        assert_eq!(pool.token1, high);
        assert_eq!(pool.tick_spacing(), 1);
        assert_eq!(pool.other_token(low.address), Some(&high));
    }

    #[test]
    fn test_snapshot_rejects_unknown_fee_tier() {
        let result = PoolSnapshot::new(
            Address::zero(),
            token(1, "A"),
            token(2, "B"),
            42,
            U256::from(1u128 << 96),
            0,
            0,
        );
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    }

    #[test]
    fn test_allowance_covers() {
        let allowance = Allowance {
            owner: Address::zero(),
            spender: Address::zero(),
            token: Address::zero(),
            amount: U256::from(10),
        };
        assert!(allowance.covers(U256::from(10)));
        assert!(!allowance.covers(U256::from(11)));
    }
}
