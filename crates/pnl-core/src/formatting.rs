use rust_decimal::{Decimal, RoundingStrategy};

/// Format a decimal with thousands separators and a fixed number of decimal
/// places. Midpoints round away from zero.
///
/// # Examples
///
/// ```
/// use pnl_core::formatting::format_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_amount(Decimal::new(12345, 1), 1), "1,234.5");
/// assert_eq!(format_amount(Decimal::new(1234567, 0), 0), "1,234,567");
/// assert_eq!(format_amount(Decimal::ZERO, 2), "0.00");
/// assert_eq!(format_amount(Decimal::new(-98765, 1), 1), "-9,876.5");
/// ```
pub fn format_amount(value: Decimal, decimals: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);

    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().to_string();

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits.as_str(), None),
    };

    let grouped = group_thousands(int_part);
    let body = match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    };

    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format a monetary amount in whole currency units, as the dashboard cards do.
///
/// # Examples
///
/// ```
/// use pnl_core::formatting::format_currency;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_currency(Decimal::new(123456, 2)), "$1,235");
/// assert_eq!(format_currency(Decimal::ZERO), "$0");
/// assert_eq!(format_currency(Decimal::new(-999, 2)), "-$10");
/// ```
pub fn format_currency(amount: Decimal) -> String {
    if amount.is_sign_negative() && !amount.round().is_zero() {
        format!("-${}", format_amount(amount.abs(), 0))
    } else {
        format!("${}", format_amount(amount.abs(), 0))
    }
}

/// Format a percentage with one decimal place.
///
/// ```
/// use pnl_core::formatting::format_percentage;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_percentage(Decimal::new(1234, 2)), "12.3%");
/// ```
pub fn format_percentage(value: Decimal) -> String {
    format!("{}%", format_amount(value, 1))
}

/// Insert commas every three digits from the right.
fn group_thousands(s: &str) -> String {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len <= 3 {
        return s.to_string();
    }
    let mut result = String::with_capacity(len + len / 3);
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(b as char);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_amount_rounding() {
        assert_eq!(format_amount(dec!(2.345), 2), "2.35");
        assert_eq!(format_amount(dec!(-2.345), 2), "-2.35");
        assert_eq!(format_amount(dec!(999.995), 2), "1,000.00");
    }

    #[test]
    fn test_format_amount_pads_decimals() {
        assert_eq!(format_amount(dec!(5), 2), "5.00");
    }

    #[test]
    fn test_format_amount_negative_zero() {
        assert_eq!(format_amount(dec!(-0.001), 2), "0.00");
    }

    #[test]
    fn test_format_currency_large() {
        assert_eq!(format_currency(dec!(2466633.02)), "$2,466,633");
    }

    #[test]
    fn test_format_percentage_negative() {
        assert_eq!(format_percentage(dec!(-4.25)), "-4.3%");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("1234567"), "1,234,567");
    }
}
