use crate::core::{AgentError, AgentResult, PoolSnapshot, QuoteResult, BPS_DENOMINATOR, MAX_SLIPPAGE_BPS};
use crate::math::{big_to_u256, u256_to_big, PoolMath};
use ethers::types::{Address, U256};
use log::{debug, warn};
use num_bigint::BigUint;
use std::sync::Arc;

/// floor(estimated × (10000 − bps) / 10000)
pub fn minimum_output_for(estimated: U256, slippage_bps: u16) -> AgentResult<U256> {
    if slippage_bps > MAX_SLIPPAGE_BPS {
        return Err(AgentError::InvalidInput(format!(
            "Slippage {} bps exceeds {} bps",
            slippage_bps, MAX_SLIPPAGE_BPS
        )));
    }
    let keep = BigUint::from(BPS_DENOMINATOR - slippage_bps as u32);
    let minimum = u256_to_big(estimated) * keep / BigUint::from(BPS_DENOMINATOR);
    big_to_u256(&minimum)
}

/// Prices an exact-input trade against a pool snapshot.
pub struct QuoteCalculator {
    math: Arc<dyn PoolMath>,
}

impl QuoteCalculator {
    pub fn new(math: Arc<dyn PoolMath>) -> Self {
        Self { math }
    }

    /// `None` when there is nothing to quote: no pool, a zero amount, a token
    /// that is not in the pool, or a pricing failure (logged).
    pub fn compute_quote(
        &self,
        pool: Option<&PoolSnapshot>,
        token_in: Address,
        amount_in: U256,
        slippage_bps: u16,
    ) -> Option<QuoteResult> {
        let pool = pool?;
        if amount_in.is_zero() {
            return None;
        }
        let token_out = pool.other_token(token_in)?.address;

        let estimated_output = match self.math.quote_exact_input(pool, token_in, amount_in) {
            Ok(out) => out,
            Err(e) => {
                warn!("Quote failed for pool {:?}: {}", pool.address, e);
                return None;
            }
        };
        let minimum_output = match minimum_output_for(estimated_output, slippage_bps) {
            Ok(min) => min,
            Err(e) => {
                warn!("Quote failed for pool {:?}: {}", pool.address, e);
                return None;
            }
        };

        debug!(
            "Quote {} of {:?} -> {} (min {}) of {:?}",
            amount_in, token_in, estimated_output, minimum_output, token_out
        );

        Some(QuoteResult {
            token_in,
            token_out,
            input_amount: amount_in,
            estimated_output,
            minimum_output,
            slippage_tolerance_bps: slippage_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TokenDescriptor;
    use crate::math::UniswapV3Math;
    use proptest::prelude::*;

    fn pool(sqrt_price_x96: U256) -> PoolSnapshot {
        PoolSnapshot::new(
            Address::repeat_byte(0x99),
            TokenDescriptor::new(1, Address::repeat_byte(0x01), 18, "T0"),
            TokenDescriptor::new(1, Address::repeat_byte(0x02), 6, "T1"),
            100,
            sqrt_price_x96,
            0,
            1_000_000,
        )
        .unwrap()
    }

    fn calculator() -> QuoteCalculator {
        QuoteCalculator::new(Arc::new(UniswapV3Math::new()))
    }

    #[test]
    fn test_minimum_output_rounds_down() {
        assert_eq!(minimum_output_for(U256::from(1000), 50).unwrap(), U256::from(995));
        assert_eq!(minimum_output_for(U256::from(199), 50).unwrap(), U256::from(198));
        assert_eq!(minimum_output_for(U256::from(1), 50).unwrap(), U256::zero());
        assert_eq!(minimum_output_for(U256::MAX, 0).unwrap(), U256::MAX);
        assert!(minimum_output_for(U256::one(), 10_001).is_err());
    }

    #[test]
    fn test_quote_none_cases() {
        let calc = calculator();
        let p = pool(U256::from(1u128 << 96));

        assert!(calc.compute_quote(None, p.token0.address, U256::one(), 50).is_none());
        assert!(calc.compute_quote(Some(&p), p.token0.address, U256::zero(), 50).is_none());
        assert!(calc
            .compute_quote(Some(&p), Address::repeat_byte(0x42), U256::one(), 50)
            .is_none());
        assert!(calc
            .compute_quote(Some(&p), p.token0.address, U256::one(), 20_000)
            .is_none());
    }

    #[test]
    fn test_quote_fills_both_sides() {
        let calc = calculator();
        let p = pool(U256::from(1u128 << 96));
        let quote = calc
            .compute_quote(Some(&p), p.token1.address, U256::from(10_000), 50)
            .unwrap();

        assert_eq!(quote.token_in, p.token1.address);
        assert_eq!(quote.token_out, p.token0.address);
        assert_eq!(quote.estimated_output, U256::from(10_000));
        assert_eq!(quote.minimum_output, U256::from(9_950));
        assert_eq!(quote.slippage_tolerance_bps, 50);
    }

    proptest! {
        #[test]
        fn prop_minimum_output_matches_floor(
            sqrt in (1u128 << 80)..(1u128 << 112),
            amount in 1u128..u128::MAX / 2,
            zero_for_one in any::<bool>(),
        ) {
            let calc = calculator();
            let p = pool(U256::from(sqrt));
            let token_in = if zero_for_one { p.token0.address } else { p.token1.address };

            let first = calc.compute_quote(Some(&p), token_in, U256::from(amount), 50);
            let second = calc.compute_quote(Some(&p), token_in, U256::from(amount), 50);
            prop_assert_eq!(&first, &second);

            let quote = first.unwrap();
            prop_assert_eq!(
                quote.minimum_output,
                quote.estimated_output * U256::from(9950) / U256::from(10_000)
            );
        }
    }
}
