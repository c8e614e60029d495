use crate::core::{AgentError, AgentResult};
use num_bigint::BigUint;
use num_traits::{One, Zero};

pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

// Q128.128 multipliers for each set bit of |tick|, from the V3 core TickMath library.
const TICK_FACTORS: [(u32, &str); 19] = [
    (0x2, "fff97272373d413259a46990580e213a"),
    (0x4, "fff2e50f5f656932ef12357cf3c7fdcc"),
    (0x8, "ffe5caca7e10e4e61c3624eaa0941cd0"),
    (0x10, "ffcb9843d60f6159c9db58835c926644"),
    (0x20, "ff973b41fa98c081472e6896dfb254c0"),
    (0x40, "ff2ea16466c96a3843ec78b326b52861"),
    (0x80, "fe5dee046a99a2a811c461f1969c3053"),
    (0x100, "fcbe86c7900a88aedcffc83b479aa3a4"),
    (0x200, "f987a7253ac413176f2b074cf7815e54"),
    (0x400, "f3392b0822b70005940c7a398e4b70f3"),
    (0x800, "e7159475a2c29b7443b29c7fa6e889d9"),
    (0x1000, "d097f3bdfd2022b8845ad8f792aa5825"),
    (0x2000, "a9f746462d870fdf8a65dc1f90e061e5"),
    (0x4000, "70d869a156d2a1b890bb3df62baf32f7"),
    (0x8000, "31be135f97d08fd981231505542fcfa6"),
    (0x10000, "9aa508b5b7a84e1c677de54f3e99bc9"),
    (0x20000, "5d6af8dedb81196699c329225ee604"),
    (0x40000, "2216e584f5fa1ea926041bedfe98"),
    (0x80000, "48a170391f7dc42444e8fa2"),
];

const TICK_ONE_FACTOR: &str = "fffcb933bd6fad37aa2d162d1a594001";

fn hex(digits: &str) -> BigUint {
    // constants above are valid hex
    BigUint::parse_bytes(digits.as_bytes(), 16).unwrap_or_default()
}

/// sqrt(1.0001^tick) as a Q64.96 integer, bit-exact with the on-chain library.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> AgentResult<BigUint> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(AgentError::InvalidInput(format!(
            "Tick {} outside [{}, {}]",
            tick, MIN_TICK, MAX_TICK
        )));
    }
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        hex(TICK_ONE_FACTOR)
    } else {
        BigUint::one() << 128
    };

    for (bit, factor) in TICK_FACTORS.iter() {
        if abs_tick & bit != 0 {
            ratio = (ratio * hex(factor)) >> 128;
        }
    }

    if tick > 0 {
        let max = (BigUint::one() << 256) - BigUint::one();
        ratio = max / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let remainder_mask = (BigUint::one() << 32) - BigUint::one();
    let round_up = !(&ratio & &remainder_mask).is_zero();
    let mut sqrt_price = ratio >> 32;
    if round_up {
        sqrt_price += BigUint::one();
    }
    Ok(sqrt_price)
}

/// Rounds `tick` to the closest multiple of `tick_spacing` (halves go up),
/// keeping the result inside the usable tick range.
pub fn nearest_usable_tick(tick: i32, tick_spacing: i32) -> AgentResult<i32> {
    if tick_spacing <= 0 {
        return Err(AgentError::InvalidInput(format!(
            "Tick spacing must be positive, got {}",
            tick_spacing
        )));
    }
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(AgentError::InvalidInput(format!("Tick {} out of range", tick)));
    }

    let quotient = tick.div_euclid(tick_spacing);
    let remainder = tick.rem_euclid(tick_spacing);
    let rounded = if 2 * remainder >= tick_spacing {
        (quotient + 1) * tick_spacing
    } else {
        quotient * tick_spacing
    };

    if rounded < MIN_TICK {
        Ok(rounded + tick_spacing)
    } else if rounded > MAX_TICK {
        Ok(rounded - tick_spacing)
    } else {
        Ok(rounded)
    }
}
