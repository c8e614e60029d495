use crate::core::{AgentError, AgentResult};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Split a decimal amount into its whole and fraction digits.
///
/// Only ASCII digits and at most one dot are accepted: no sign, exponent or
/// digit separators.
fn amount_digits(amount: &str) -> AgentResult<(&str, &str)> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AgentError::InvalidInput("Amount is empty".to_string()));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if (whole.is_empty() && fraction.is_empty())
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AgentError::InvalidInput(format!(
            "'{}' is not a valid amount",
            amount
        )));
    }
    Ok((whole, fraction))
}

/// Parse a human-readable decimal amount into base units.
///
/// Rejects empty, signed, malformed and over-precise input instead of rounding.
pub fn parse_units(amount: &str, decimals: u8) -> AgentResult<U256> {
    let (whole, fraction) = amount_digits(amount)?;

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AgentError::InvalidInput(format!(
            "'{}' has more than {} decimal places",
            amount.trim(),
            decimals
        )));
    }

    let digits = format!(
        "{}{}{}",
        whole,
        fraction,
        "0".repeat(decimals as usize - fraction.len())
    );
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| AgentError::MathOverflow)
}

/// Format base units as a decimal string without trailing zeros.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Validates that `amount` is a decimal number greater than zero, using the
/// same grammar as [`parse_units`] so no token decimals are needed.
pub fn validate_amount(amount: &str) -> AgentResult<()> {
    let (whole, fraction) = amount_digits(amount)?;
    if whole.chars().chain(fraction.chars()).all(|c| c == '0') {
        return Err(AgentError::InvalidInput(format!(
            "Amount must be greater than zero, got {}",
            amount.trim()
        )));
    }
    Ok(())
}

/// Fee tier in hundredths of a bip as a percentage, e.g. 3000 -> "0.3%".
pub fn fee_tier_percent(fee_tier: u32) -> String {
    format!("{}%", Decimal::new(fee_tier as i64, 4).normalize())
}

/// Parse a hex token or contract address.
pub fn parse_address(input: &str) -> AgentResult<Address> {
    Address::from_str(input.trim())
        .map_err(|_| AgentError::InvalidInput(format!("'{}' is not a valid address", input)))
}

/// Format large numbers with thousands separators
pub fn format_number(n: u128) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let mut count = 0;

    for ch in s.chars().rev() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(ch);
        count += 1;
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("30", 6 => U256::from(30_000_000u64))]
    #[test_case("0.03", 18 => U256::from(30_000_000_000_000_000u64))]
    #[test_case("1.50", 2 => U256::from(150u64); "trailing zeros ignored")]
    #[test_case(".5", 1 => U256::from(5u64))]
    #[test_case("7.", 0 => U256::from(7u64))]
    #[test_case("0", 18 => U256::zero())]
    fn test_parse_units(amount: &str, decimals: u8) -> U256 {
        parse_units(amount, decimals).unwrap()
    }

    #[test_case(""; "empty")]
    #[test_case("-1"; "negative")]
    #[test_case("1.2.3"; "two dots")]
    #[test_case("abc"; "letters")]
    #[test_case("."; "lone dot")]
    #[test_case("0.0000001"; "too precise")]
    fn test_parse_units_rejects(amount: &str) {
        assert!(matches!(
            parse_units(amount, 6),
            Err(AgentError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(30_000_000u64), 6), "30");
        assert_eq!(format_units(U256::from(1_234_500u64), 6), "1.2345");
        assert_eq!(format_units(U256::from(5u64), 18), "0.000000000000000005");
        assert_eq!(format_units(U256::zero(), 18), "0");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test_case("0.03")]
    #[test_case("1")]
    #[test_case(".5")]
    #[test_case(" 2 "; "surrounding whitespace")]
    fn test_validate_amount_accepts(amount: &str) {
        assert!(validate_amount(amount).is_ok());
    }

    #[test_case("0"; "zero")]
    #[test_case("0.000"; "zero with fraction")]
    #[test_case("-3"; "negative")]
    #[test_case("ten"; "letters")]
    #[test_case("+1"; "plus sign")]
    #[test_case("1_0"; "digit separator")]
    #[test_case("1e3"; "exponent")]
    fn test_validate_amount_rejects(amount: &str) {
        assert!(matches!(
            validate_amount(amount),
            Err(AgentError::InvalidInput(_))
        ));
    }

    #[test_case("+1")]
    #[test_case("1_0")]
    #[test_case("1e3")]
    fn test_validation_agrees_with_parse_units(amount: &str) {
        assert!(validate_amount(amount).is_err());
        assert!(parse_units(amount, 18).is_err());
    }

    #[test_case(100 => "0.01%")]
    #[test_case(500 => "0.05%")]
    #[test_case(3000 => "0.3%")]
    #[test_case(10000 => "1%")]
    fn test_fee_tier_percent(fee: u32) -> String {
        fee_tier_percent(fee)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567890), "1,234,567,890");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(0), "0");
    }
}
