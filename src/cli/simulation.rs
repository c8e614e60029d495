//! Seeded in-memory chain behind `--simulate`.

use crate::chain::InMemoryChain;
use crate::core::{AgentError, AgentResult, LIQUIDITY_FEE_TIER};
use crate::math::{big_to_u256, tick_math::get_sqrt_ratio_at_tick};
use ethers::types::{Address, U256};
use std::str::FromStr;

pub const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

// USDC/WETH 0.01% pool around 3000 USDC per WETH
const POOL: &str = "0xE0554a476A092703abdB3Ef35c80e0D76d32939F";
const POOL_TICK: i32 = 196_256;
const POOL_LIQUIDITY: u128 = 2_500_000_000_000_000_000;

const SIGNER: &str = "0x5151515151515151515151515151515151515151";
const AGENT: &str = "0xa6a6a6a6a6a6a6a6a6a6a6a6a6a6a6a6a6a6a6a6";

pub fn signer() -> AgentResult<Address> {
    address(SIGNER)
}

pub fn agent() -> AgentResult<Address> {
    address(AGENT)
}

/// A chain with USDC, WETH, one USDC/WETH pool and a funded signer.
pub fn seeded_chain(chain_id: u64) -> AgentResult<InMemoryChain> {
    let signer = signer()?;
    let usdc = address(USDC)?;
    let weth = address(WETH)?;
    let chain = InMemoryChain::new(chain_id, signer);

    chain.add_token(usdc, 6, "USDC");
    chain.add_token(weth, 18, "WETH");
    chain.add_pool(
        address(POOL)?,
        usdc,
        weth,
        LIQUIDITY_FEE_TIER,
        big_to_u256(&get_sqrt_ratio_at_tick(POOL_TICK)?)?,
        POOL_TICK,
        POOL_LIQUIDITY,
    );
    chain.set_balance(usdc, signer, U256::from(10_000u64) * U256::exp10(6));
    chain.set_balance(weth, signer, U256::from(5u64) * U256::exp10(18));

    Ok(chain)
}

fn address(raw: &str) -> AgentResult<Address> {
    Address::from_str(raw).map_err(|e| AgentError::ConfigError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainReader;

    #[tokio::test]
    async fn test_seeded_chain_has_pool_and_funds() {
        let chain = seeded_chain(1).unwrap();
        let usdc = address(USDC).unwrap();
        let weth = address(WETH).unwrap();

        let pool = chain.get_pool(weth, usdc, 100).await.unwrap();
        assert!(!pool.is_zero());
        assert_eq!(chain.slot0(pool).await.unwrap().tick, POOL_TICK);
        assert_eq!(
            chain.balance_of(usdc, signer().unwrap()).await.unwrap(),
            U256::from(10_000_000_000u64)
        );
    }
}
