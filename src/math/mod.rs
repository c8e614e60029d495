//! Pool pricing oracle.
//!
//! Orchestration treats pool math as an exact, deterministic dependency behind
//! `PoolMath`. `UniswapV3Math` is the concentrated-liquidity implementation.

pub mod liquidity_math;
pub mod tick_math;

use crate::core::{AgentError, AgentResult, PoolSnapshot};
use ethers::types::{Address, U256};
use num_bigint::BigUint;
use num_traits::One;

pub trait PoolMath: Send + Sync {
    /// Amount of the other token that `amount_in` of `token_in` is worth at the pool's spot price.
    fn quote_exact_input(
        &self,
        pool: &PoolSnapshot,
        token_in: Address,
        amount_in: U256,
    ) -> AgentResult<U256>;

    fn nearest_usable_tick(&self, tick: i32, tick_spacing: i32) -> AgentResult<i32>;

    /// Deposit amounts for a position over [tick_lower, tick_upper] that fit
    /// inside the desired amounts and match the pool's current price.
    fn position_amounts(
        &self,
        pool: &PoolSnapshot,
        tick_lower: i32,
        tick_upper: i32,
        amount0_desired: U256,
        amount1_desired: U256,
    ) -> AgentResult<(U256, U256)>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UniswapV3Math;

impl UniswapV3Math {
    pub fn new() -> Self {
        Self
    }
}

impl PoolMath for UniswapV3Math {
    fn quote_exact_input(
        &self,
        pool: &PoolSnapshot,
        token_in: Address,
        amount_in: U256,
    ) -> AgentResult<U256> {
        let sqrt_price = u256_to_big(pool.sqrt_price_x96);
        let price_x192 = &sqrt_price * &sqrt_price;
        let q192 = BigUint::one() << 192;
        let amount = u256_to_big(amount_in);

        let out = if token_in == pool.token0.address {
            amount * price_x192 / q192
        } else if token_in == pool.token1.address {
            if price_x192 == BigUint::default() {
                return Err(AgentError::MathOverflow);
            }
            amount * q192 / price_x192
        } else {
            return Err(AgentError::Quote(format!(
                "{:?} is not a token of pool {:?}",
                token_in, pool.address
            )));
        };

        big_to_u256(&out)
    }

    fn nearest_usable_tick(&self, tick: i32, tick_spacing: i32) -> AgentResult<i32> {
        tick_math::nearest_usable_tick(tick, tick_spacing)
    }

    fn position_amounts(
        &self,
        pool: &PoolSnapshot,
        tick_lower: i32,
        tick_upper: i32,
        amount0_desired: U256,
        amount1_desired: U256,
    ) -> AgentResult<(U256, U256)> {
        if tick_lower >= tick_upper {
            return Err(AgentError::InvalidInput(format!(
                "Empty tick range [{}, {}]",
                tick_lower, tick_upper
            )));
        }

        let sqrt_price = u256_to_big(pool.sqrt_price_x96);
        let sqrt_lower = tick_math::get_sqrt_ratio_at_tick(tick_lower)?;
        let sqrt_upper = tick_math::get_sqrt_ratio_at_tick(tick_upper)?;

        let liquidity = liquidity_math::max_liquidity_for_amounts(
            &sqrt_price,
            &sqrt_lower,
            &sqrt_upper,
            &u256_to_big(amount0_desired),
            &u256_to_big(amount1_desired),
        );
        let (amount0, amount1) =
            liquidity_math::amounts_for_liquidity(&sqrt_price, &sqrt_lower, &sqrt_upper, &liquidity);

        Ok((big_to_u256(&amount0)?, big_to_u256(&amount1)?))
    }
}

pub fn u256_to_big(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

pub fn big_to_u256(value: &BigUint) -> AgentResult<U256> {
    let bytes = value.to_bytes_be();
    if bytes.len() > 32 {
        return Err(AgentError::MathOverflow);
    }
    Ok(U256::from_big_endian(&bytes))
}
