//! # Liquidity & swap math: constant-product pricing
//!
//! Pure functions over pool reserves. All rounding is floor except the
//! non-binding side of a proportional deposit, which rounds up so the pool
//! never ends with a worse reserve ratio than before.
//!
//! ## Pool lifecycle
//! - Empty  (total_liquidity == 0): first deposit sets the ratio,
//!   shares = floor(sqrt(x * y))
//! - Funded (total_liquidity > 0): deposits are accepted in the current
//!   ratio, surplus of the non-binding side stays with the provider
//! - Removing every share returns the pool to Empty

use crate::amount::{isqrt, mul_div, mul_div_ceil, Amount, COIN};
use crate::error::LedgerError;
use crate::pool::PoolPair;

/// Accepted deposit for an add-liquidity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddQuote {
    pub accept_a: Amount,
    pub accept_b: Amount,
    pub shares: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Commission, paid to the pool owner in the input token
    pub fee: Amount,
    pub effective_in: Amount,
    pub amount_out: Amount,
}

fn out_of_range() -> LedgerError {
    LedgerError::AmountOutOfRange("Amount out of range".to_string())
}

fn overflow() -> LedgerError {
    LedgerError::AmountOutOfRange("Amount out of range: arithmetic overflow".to_string())
}

/// Quote depositing `x` of token A and `y` of token B.
pub fn quote_add(pool: &PoolPair, x: Amount, y: Amount) -> Result<AddQuote, LedgerError> {
    if x == 0 || y == 0 {
        return Err(out_of_range());
    }

    if !pool.is_funded() {
        let product = x.checked_mul(y).ok_or_else(overflow)?;
        let shares = isqrt(product);
        if shares == 0 {
            return Err(out_of_range());
        }
        return Ok(AddQuote {
            accept_a: x,
            accept_b: y,
            shares,
        });
    }

    let total = pool.total_liquidity;
    let (ra, rb) = (pool.reserve_a, pool.reserve_b);
    let liq_a = mul_div(x, total, ra).ok_or_else(overflow)?;
    let liq_b = mul_div(y, total, rb).ok_or_else(overflow)?;

    let quote = if liq_a <= liq_b {
        let accept_b = mul_div_ceil(x, rb, ra).ok_or_else(overflow)?.min(y);
        AddQuote {
            accept_a: x,
            accept_b,
            shares: liq_a,
        }
    } else {
        let accept_a = mul_div_ceil(y, ra, rb).ok_or_else(overflow)?.min(x);
        AddQuote {
            accept_a,
            accept_b: y,
            shares: liq_b,
        }
    };
    if quote.shares == 0 {
        return Err(LedgerError::AmountOutOfRange(
            "Amount out of range: deposit too small to mint liquidity".to_string(),
        ));
    }
    Ok(quote)
}

/// Reserves returned for burning `shares`: (amount_a, amount_b).
pub fn quote_remove(pool: &PoolPair, shares: Amount) -> Result<(Amount, Amount), LedgerError> {
    if shares == 0 || shares > pool.total_liquidity {
        return Err(out_of_range());
    }
    let a = mul_div(pool.reserve_a, shares, pool.total_liquidity).ok_or_else(overflow)?;
    let b = mul_div(pool.reserve_b, shares, pool.total_liquidity).ok_or_else(overflow)?;
    Ok((a, b))
}

/// Constant-product swap with the commission taken off the input first.
pub fn quote_swap(
    reserve_in: Amount,
    reserve_out: Amount,
    amount_in: Amount,
    commission: Amount,
) -> Result<SwapQuote, LedgerError> {
    if amount_in == 0 {
        return Err(out_of_range());
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(LedgerError::AmountOutOfRange(
            "Lack of liquidity".to_string(),
        ));
    }
    let fee = mul_div(amount_in, commission, COIN).ok_or_else(overflow)?;
    let effective_in = amount_in - fee;
    let denominator = reserve_in.checked_add(effective_in).ok_or_else(overflow)?;
    let amount_out = mul_div(reserve_out, effective_in, denominator).ok_or_else(overflow)?;
    if amount_out == 0 {
        return Err(LedgerError::AmountOutOfRange(
            "Amount out of range: swap output rounds to zero".to_string(),
        ));
    }
    Ok(SwapQuote {
        fee,
        effective_in,
        amount_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Hash256;

    fn pool(ra: Amount, rb: Amount, total: Amount) -> PoolPair {
        PoolPair {
            id: 130,
            token_a: 128,
            token_b: 129,
            reversed: false,
            reserve_a: ra,
            reserve_b: rb,
            total_liquidity: total,
            commission: COIN / 10,
            owner_fee_address: "dfxowner".to_string(),
            status: true,
            symbol: "GS".to_string(),
            creation_tx: Hash256::NULL,
            creation_height: 1,
        }
    }

    #[test]
    fn test_bootstrap_geometric_mean() {
        let q = quote_add(&pool(0, 0, 0), 100 * COIN, 500 * COIN).unwrap();
        assert_eq!(q.accept_a, 100 * COIN);
        assert_eq!(q.accept_b, 500 * COIN);
        assert_eq!(q.shares, isqrt(100 * COIN * 500 * COIN));
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let err = quote_add(&pool(0, 0, 0), 0, 0).unwrap_err();
        assert_eq!(err.to_string(), "Amount out of range");
    }

    #[test]
    fn test_surplus_stays_with_provider() {
        let p = pool(100 * COIN, 500 * COIN, 200 * COIN);
        // offer twice the B needed
        let q = quote_add(&p, 10 * COIN, 100 * COIN).unwrap();
        assert_eq!(q.accept_a, 10 * COIN);
        assert_eq!(q.accept_b, 50 * COIN);
        assert_eq!(q.shares, 20 * COIN);

        // binding side B
        let q = quote_add(&p, 100 * COIN, 50 * COIN).unwrap();
        assert_eq!(q.accept_a, 10 * COIN);
        assert_eq!(q.accept_b, 50 * COIN);
        assert_eq!(q.shares, 20 * COIN);
    }

    #[test]
    fn test_remove_proportional() {
        let p = pool(100 * COIN, 500 * COIN, 200 * COIN);
        assert_eq!(quote_remove(&p, 20 * COIN).unwrap(), (10 * COIN, 50 * COIN));
        assert_eq!(quote_remove(&p, 200 * COIN).unwrap(), (100 * COIN, 500 * COIN));
        assert!(quote_remove(&p, 201 * COIN).is_err());
    }

    #[test]
    fn test_swap_reference_numbers() {
        // 10 SILVER into a 100 GOLD / 500 SILVER pool at 10% commission
        let q = quote_swap(500 * COIN, 100 * COIN, 10 * COIN, COIN / 10).unwrap();
        assert_eq!(q.fee, COIN);
        assert_eq!(q.effective_in, 9 * COIN);
        assert_eq!(q.amount_out, 176_817_288);
        assert_eq!(500 * COIN + q.effective_in, 509 * COIN);
    }

    #[test]
    fn test_swap_empty_pool() {
        let err = quote_swap(0, 0, COIN, 0).unwrap_err();
        assert_eq!(err.to_string(), "Lack of liquidity");
        assert!(quote_swap(COIN, COIN, 0, 0).is_err());
    }
}
