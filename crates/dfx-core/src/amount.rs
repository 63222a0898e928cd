//! Fixed-point amounts.
//!
//! Every balance, reserve and UTXO value is a `u128` count of base units with
//! 8 fractional digits. Nothing in the ledger touches floating point: results
//! are compared bit-for-bit across nodes.

use crate::error::LedgerError;

pub type Amount = u128;

/// 1 coin = 100_000_000 base units (10^8 precision)
pub const COIN: Amount = 100_000_000;
/// Upper bound for any single amount or running total.
pub const MAX_MONEY: Amount = 1_200_000_000 * COIN;
/// Fractional digits carried by `COIN`.
pub const DECIMALS: usize = 8;

pub fn money_range(value: Amount) -> bool {
    value <= MAX_MONEY
}

/// Parse a decimal string ("100", "9.999", "0.00000001") into base units.
pub fn parse_amount(input: &str) -> Result<Amount, LedgerError> {
    let s = input.trim();
    let invalid = || LedgerError::AmountOutOfRange(format!("Invalid amount '{}'", input));

    if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
        return Err(invalid());
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > DECIMALS {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole_units: Amount = if whole.is_empty() {
        0
    } else {
        whole.parse::<Amount>().map_err(|_| invalid())?
    };
    let mut frac_units: Amount = 0;
    for (i, c) in frac.chars().enumerate() {
        let digit = c.to_digit(10).ok_or_else(invalid)? as Amount;
        frac_units += digit * 10u128.pow((DECIMALS - 1 - i) as u32);
    }

    let value = whole_units
        .checked_mul(COIN)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or_else(|| LedgerError::AmountOutOfRange("Amount out of range".to_string()))?;
    if !money_range(value) {
        return Err(LedgerError::AmountOutOfRange("Amount out of range".to_string()));
    }
    Ok(value)
}

/// Render base units as a trimmed decimal ("509", "9.999", "1.76817288").
pub fn format_amount(value: Amount) -> String {
    let whole = value / COIN;
    let frac = value % COIN;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:08}", frac);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// `amount@TOKEN` as written on the command surface. The token side is kept
/// verbatim: it may be a symbol or a numeric id and is resolved against state
/// by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    pub amount: Amount,
    pub token: String,
}

impl TokenAmount {
    pub fn parse(input: &str) -> Result<Self, LedgerError> {
        let (amount, token) = input.trim().split_once('@').ok_or_else(|| {
            LedgerError::AmountOutOfRange(format!(
                "Invalid token amount '{}', expected amount@token",
                input
            ))
        })?;
        if token.is_empty() {
            return Err(LedgerError::InvalidToken(format!(
                "Invalid token amount '{}': empty token",
                input
            )));
        }
        Ok(Self {
            amount: parse_amount(amount)?,
            token: token.to_string(),
        })
    }

    /// Comma-separated list: "100@GOLD,5@SILVER".
    pub fn parse_list(input: &str) -> Result<Vec<Self>, LedgerError> {
        input
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}@{}", format_amount(self.amount), self.token)
    }
}

/// Integer square root (floor).
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an upper bound; converges monotonically downward.
    let mut x = 1u128 << ((128 - n.leading_zeros()).div_ceil(2));
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// `a * b / c`, floor-rounded. `None` on overflow or division by zero.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Option<Amount> {
    if c == 0 {
        return None;
    }
    a.checked_mul(b).map(|p| p / c)
}

/// `a * b / c`, ceil-rounded.
pub fn mul_div_ceil(a: Amount, b: Amount, c: Amount) -> Option<Amount> {
    if c == 0 {
        return None;
    }
    a.checked_mul(b).map(|p| p.div_ceil(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100").unwrap(), 100 * COIN);
        assert_eq!(parse_amount("9.999").unwrap(), 999_900_000);
        assert_eq!(parse_amount("0.1").unwrap(), 10_000_000);
        assert_eq!(parse_amount("0.00000001").unwrap(), 1);
        assert_eq!(parse_amount(".5").unwrap(), COIN / 2);
        assert_eq!(parse_amount("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1.123456789").is_err());
        assert!(parse_amount("1e8").is_err());
        assert!(parse_amount(".").is_err());
        assert!(parse_amount("1200000001").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(509 * COIN), "509");
        assert_eq!(format_amount(999_900_000), "9.999");
        assert_eq!(format_amount(176_817_288), "1.76817288");
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(1), "0.00000001");
    }

    #[test]
    fn test_token_amount() {
        let ta = TokenAmount::parse("100@GOLD").unwrap();
        assert_eq!(ta.amount, 100 * COIN);
        assert_eq!(ta.token, "GOLD");
        assert_eq!(ta.to_string(), "100@GOLD");

        let list = TokenAmount::parse_list("1@GOLD, 2.5@129").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].token, "129");
        assert_eq!(list[1].amount, 250_000_000);

        assert!(TokenAmount::parse("100").is_err());
        assert!(TokenAmount::parse("100@").is_err());
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(100 * COIN * 100 * COIN), 100 * COIN);
        let big = MAX_MONEY * MAX_MONEY;
        let r = isqrt(big);
        assert_eq!(r, MAX_MONEY);
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(100 * COIN, 9 * COIN, 509 * COIN), Some(176_817_288));
        assert_eq!(mul_div_ceil(10, 1, 3), Some(4));
        assert_eq!(mul_div(1, 1, 0), None);
        assert_eq!(mul_div(u128::MAX, 2, 1), None);
    }
}
