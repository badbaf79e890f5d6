//! Parse money amounts and weights.
//!
//! Amounts are parsed from their textual form straight into cents, so that a
//! client sending `0.1` gets exactly 10 cents and not whatever the nearest
//! binary float rounds to.

use std::str::FromStr;

use nom::{
    character::complete::{digit0, digit1, one_of},
    combinator::{all_consuming, map_opt, opt, recognize},
    sequence::{preceded, tuple},
    IResult,
};
use rust_decimal::Decimal;

use crate::{
    error::InputError,
    types::{Amount, MAX_AMOUNT},
};

const CENTS_PER_UNIT: Amount = 100;

/// Parse an amount with an optional sign and at most two significant decimal
/// places. Both `.` and `,` are accepted as decimal separator.
pub fn parse_amount(s: &str) -> Result<Amount, InputError> {
    let amount = all_consuming(amount)(s.trim())
        .map(|(_, a)| a)
        .map_err(|_| InputError::invalid_amount(s))?;

    if amount.abs() > MAX_AMOUNT {
        Err(InputError::amount_out_of_range(s))
    } else {
        Ok(amount)
    }
}

/// Parse a percentage or share count.
pub fn parse_decimal(field: &'static str, s: &str) -> Result<Decimal, InputError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| InputError::invalid_decimal(field, s))
}

fn amount(s: &str) -> IResult<&str, Amount> {
    map_opt(
        tuple((
            opt(one_of("+-")),
            digit1,
            opt(preceded(one_of(".,"), recognize(digit0))),
        )),
        |(sign, integer_part, fractional_part)| {
            let cents = to_cents(integer_part, fractional_part.unwrap_or(""))?;
            if sign == Some('-') {
                Some(-cents)
            } else {
                Some(cents)
            }
        },
    )(s)
}

/// Digits after the second decimal place are only tolerated when they are
/// all zeros, otherwise we would silently drop part of the amount.
fn to_cents(integer_part: &str, fractional_part: &str) -> Option<Amount> {
    let (cents, rest) = fractional_part.split_at(fractional_part.len().min(2));
    if rest.chars().any(|c| c != '0') {
        return None;
    }

    let integer: Amount = integer_part.parse().ok()?;
    let cents: Amount = format!("{cents:0<2}").parse().ok()?;

    integer.checked_mul(CENTS_PER_UNIT)?.checked_add(cents)
}
