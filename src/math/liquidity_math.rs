use num_bigint::BigUint;
use num_traits::{One, Zero};

fn q96() -> BigUint {
    BigUint::one() << 96
}

fn ordered<'a>(a: &'a BigUint, b: &'a BigUint) -> (&'a BigUint, &'a BigUint) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Liquidity backed by `amount0` between two sqrt prices, full precision.
pub fn liquidity_for_amount0(sqrt_a: &BigUint, sqrt_b: &BigUint, amount0: &BigUint) -> BigUint {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    let denominator = upper - lower;
    if denominator.is_zero() {
        return BigUint::zero();
    }
    let numerator = amount0 * lower * upper / q96();
    numerator / denominator
}

pub fn liquidity_for_amount1(sqrt_a: &BigUint, sqrt_b: &BigUint, amount1: &BigUint) -> BigUint {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    let denominator = upper - lower;
    if denominator.is_zero() {
        return BigUint::zero();
    }
    amount1 * q96() / denominator
}

/// Largest liquidity the two amounts can back at the current price.
pub fn max_liquidity_for_amounts(
    sqrt_price: &BigUint,
    sqrt_a: &BigUint,
    sqrt_b: &BigUint,
    amount0: &BigUint,
    amount1: &BigUint,
) -> BigUint {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);

    if sqrt_price <= lower {
        liquidity_for_amount0(lower, upper, amount0)
    } else if sqrt_price < upper {
        let l0 = liquidity_for_amount0(sqrt_price, upper, amount0);
        let l1 = liquidity_for_amount1(lower, sqrt_price, amount1);
        l0.min(l1)
    } else {
        liquidity_for_amount1(lower, upper, amount1)
    }
}

/// token0 owed for `liquidity` between two sqrt prices, rounded down.
pub fn amount0_for_liquidity(sqrt_a: &BigUint, sqrt_b: &BigUint, liquidity: &BigUint) -> BigUint {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    if lower.is_zero() {
        return BigUint::zero();
    }
    ((liquidity << 96u32) * (upper - lower) / upper) / lower
}

/// token1 owed for `liquidity` between two sqrt prices, rounded down.
pub fn amount1_for_liquidity(sqrt_a: &BigUint, sqrt_b: &BigUint, liquidity: &BigUint) -> BigUint {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);
    liquidity * (upper - lower) / q96()
}

pub fn amounts_for_liquidity(
    sqrt_price: &BigUint,
    sqrt_a: &BigUint,
    sqrt_b: &BigUint,
    liquidity: &BigUint,
) -> (BigUint, BigUint) {
    let (lower, upper) = ordered(sqrt_a, sqrt_b);

    if sqrt_price <= lower {
        (amount0_for_liquidity(lower, upper, liquidity), BigUint::zero())
    } else if sqrt_price < upper {
        (
            amount0_for_liquidity(sqrt_price, upper, liquidity),
            amount1_for_liquidity(lower, sqrt_price, liquidity),
        )
    } else {
        (BigUint::zero(), amount1_for_liquidity(lower, upper, liquidity))
    }
}
