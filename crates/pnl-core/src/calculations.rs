//! Decimal money arithmetic shared by the normalizer and the aggregator.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{PnlError, Result};

/// Decimal places kept for every normalized amount.
///
/// Rounding once per row keeps breakdown sums exactly equal to totals.
pub const AMOUNT_SCALE: u32 = 4;

/// Characters stripped from amount cells before parsing.
const AMOUNT_NOISE: &[char] = &['฿', '$', ',', ' ', '"', '\u{a0}'];

/// `part / whole * 100`, or zero when `whole` is not positive or the ratio
/// does not fit in a `Decimal`.
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Back VAT out of a VAT-inclusive amount: `amount / (1 + rate)`.
pub fn remove_vat(amount: Decimal, vat_rate: Decimal) -> Decimal {
    round_amount(amount / (Decimal::ONE + vat_rate))
}

/// Round to [`AMOUNT_SCALE`] decimal places.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp(AMOUNT_SCALE)
}

/// Parse a currency cell such as `"฿1,234.50"`, `"2,000"` or `"(150.00)"`.
///
/// Parenthesised values are read as negative, as accounting exports print
/// them. Empty cells and anything non-numeric fail with [`PnlError::Parse`]
/// (the caller fills in the line number).
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let mut cleaned: String = raw.chars().filter(|c| !AMOUNT_NOISE.contains(c)).collect();

    let negative = cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    if cleaned.is_empty() {
        return Err(PnlError::Parse {
            line: 0,
            message: "empty amount".to_string(),
        });
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| PnlError::Parse {
            line: 0,
            message: format!("invalid amount {:?}", raw.trim()),
        })?;

    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // ── percentage_of ─────────────────────────────────────────────────────────

    #[test]
    fn test_percentage_of_basic() {
        assert_eq!(percentage_of(dec!(50), dec!(200)), dec!(25));
    }

    #[test]
    fn test_percentage_of_zero_whole() {
        assert_eq!(percentage_of(dec!(50), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage_of(dec!(50), dec!(-1)), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_of_negative_part() {
        assert_eq!(percentage_of(dec!(-10), dec!(100)), dec!(-10));
    }

    #[test]
    fn test_percentage_of_out_of_range_ratio() {
        assert_eq!(percentage_of(Decimal::MAX, dec!(0.5)), Decimal::ZERO);
        assert_eq!(percentage_of(Decimal::MAX, Decimal::ONE), Decimal::ZERO);
        assert_eq!(percentage_of(Decimal::MAX, Decimal::MAX), dec!(100));
    }

    // ── remove_vat ────────────────────────────────────────────────────────────

    #[test]
    fn test_remove_vat_exact() {
        assert_eq!(remove_vat(dec!(107.00), dec!(0.07)), dec!(100));
        assert_eq!(remove_vat(dec!(214.00), dec!(0.07)), dec!(200));
    }

    #[test]
    fn test_remove_vat_rounds_to_scale() {
        // 100 / 1.07 = 93.457943925...
        assert_eq!(remove_vat(dec!(100), dec!(0.07)), dec!(93.4579));
    }

    #[test]
    fn test_remove_vat_zero_rate() {
        assert_eq!(remove_vat(dec!(42.5), Decimal::ZERO), dec!(42.5));
    }

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn test_parse_amount_plain() {
        assert_eq!(parse_amount("12345.00").unwrap(), dec!(12345));
    }

    #[test]
    fn test_parse_amount_formatted() {
        assert_eq!(parse_amount("\"1,234.50\"").unwrap(), dec!(1234.5));
        assert_eq!(parse_amount("฿2,487,126.00").unwrap(), dec!(2487126));
        assert_eq!(parse_amount(" $ 99 ").unwrap(), dec!(99));
    }

    #[test]
    fn test_parse_amount_parenthesised_negative() {
        assert_eq!(parse_amount("(150.00)").unwrap(), dec!(-150));
    }

    #[test]
    fn test_parse_amount_scientific() {
        assert_eq!(parse_amount("1.5e3").unwrap(), dec!(1500));
    }

    #[test]
    fn test_parse_amount_rejects_text() {
        assert!(matches!(parse_amount("n/a"), Err(PnlError::Parse { .. })));
        assert!(matches!(parse_amount(""), Err(PnlError::Parse { .. })));
        assert!(matches!(parse_amount(" , "), Err(PnlError::Parse { .. })));
    }
}
