//! Turn an expense amount and a split policy into the amount each
//! participant owes.
//!
//! All amounts are in cents, so the only rounding happens when a share is
//! not a whole number of cents. Rounding is always down, and what is left:
//! - for `even` splits, goes to the last participant, so the split always
//!   adds up to the expense amount;
//! - for `byPercentage` and `byShares` splits, is not assigned to anyone, so
//!   the split may add up to a few cents less than the expense amount.

use rust_decimal::{prelude::ToPrimitive, Decimal};

use crate::error::SplitError;
use crate::types::{Amount, SplitLine, SplitPolicy, UserId, Weight};

/// Percentage totals within this distance from 100 are accepted.
const PERCENTAGE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Resolve the split of an expense of *amount* paid by *payer*.
///
/// The returned lines keep the order of the participants in the policy.
pub fn resolve(amount: Amount, payer: &str, policy: &SplitPolicy) -> Result<Vec<SplitLine>, SplitError> {
    if amount <= 0 {
        return Err(SplitError::NonPositiveAmount(amount));
    }

    match policy {
        SplitPolicy::SelfPaid => Ok(vec![SplitLine::new(payer, Weight::None, amount)]),
        SplitPolicy::Even(users) => resolve_even(amount, users),
        SplitPolicy::ByAmount(users) => resolve_by_amount(amount, users),
        SplitPolicy::ByPercentage(users) => resolve_by_percentage(amount, users),
        SplitPolicy::ByShares(users) => resolve_by_shares(amount, users),
    }
}

fn resolve_even(amount: Amount, users: &[UserId]) -> Result<Vec<SplitLine>, SplitError> {
    if users.is_empty() {
        return Err(SplitError::EmptyParticipants);
    }

    let n = users.len() as Amount;
    let share = amount / n;
    let remainder = amount - share * n;

    let last = users.len() - 1;
    Ok(users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let owed = if i == last { share + remainder } else { share };
            SplitLine::new(user, Weight::None, owed)
        })
        .collect())
}

fn resolve_by_amount(
    amount: Amount,
    users: &[(UserId, Amount)],
) -> Result<Vec<SplitLine>, SplitError> {
    if users.is_empty() {
        return Err(SplitError::EmptyParticipants);
    }

    if let Some((user, _)) = users.iter().find(|(_, a)| *a < 0) {
        return Err(SplitError::invalid_weight(user, "amounts cannot be negative"));
    }

    let mut total: Amount = 0;
    for (user, a) in users {
        total = total
            .checked_add(*a)
            .ok_or_else(|| SplitError::invalid_weight(user, "the split amounts are too large"))?;
    }
    if total != amount {
        return Err(SplitError::split_mismatch(amount, total));
    }

    Ok(users
        .iter()
        .map(|(user, a)| SplitLine::new(user, Weight::Amount(*a), *a))
        .collect())
}

fn resolve_by_percentage(
    amount: Amount,
    users: &[(UserId, Decimal)],
) -> Result<Vec<SplitLine>, SplitError> {
    if users.is_empty() {
        return Err(SplitError::EmptyParticipants);
    }

    if let Some((user, _)) = users
        .iter()
        .find(|(_, p)| p.is_sign_negative() || *p > Decimal::ONE_HUNDRED)
    {
        return Err(SplitError::invalid_weight(
            user,
            "percentages must be between 0 and 100",
        ));
    }

    let total: Decimal = users.iter().map(|(_, p)| p).sum();
    if (total - Decimal::ONE_HUNDRED).abs() > PERCENTAGE_TOLERANCE {
        return Err(SplitError::InvalidPercentageTotal(total));
    }

    users
        .iter()
        .map(|(user, p)| {
            let owed = floor_to_cents(Decimal::from(amount) * p / Decimal::ONE_HUNDRED, user)?;
            Ok(SplitLine::new(user, Weight::Percentage(*p), owed))
        })
        .collect()
}

fn resolve_by_shares(
    amount: Amount,
    users: &[(UserId, Decimal)],
) -> Result<Vec<SplitLine>, SplitError> {
    if users.is_empty() {
        return Err(SplitError::EmptyParticipants);
    }

    if let Some((user, _)) = users.iter().find(|(_, s)| s.is_sign_negative()) {
        return Err(SplitError::invalid_weight(user, "shares cannot be negative"));
    }

    let mut total = Decimal::ZERO;
    for (user, s) in users {
        total = total
            .checked_add(*s)
            .ok_or_else(|| SplitError::invalid_weight(user, "shares are too large"))?;
    }
    if total <= Decimal::ZERO {
        return Err(SplitError::InvalidShareTotal(total));
    }

    users
        .iter()
        .map(|(user, s)| {
            // Multiply first: the quotient is exact whenever the share divides evenly.
            let owed = Decimal::from(amount)
                .checked_mul(*s)
                .and_then(|v| v.checked_div(total))
                .ok_or_else(|| SplitError::invalid_weight(user, "shares are too large"))?;
            let owed = floor_to_cents(owed, user)?;
            Ok(SplitLine::new(user, Weight::Shares(*s), owed))
        })
        .collect()
}

fn floor_to_cents(value: Decimal, user: &str) -> Result<Amount, SplitError> {
    value
        .floor()
        .to_i64()
        .ok_or_else(|| SplitError::invalid_weight(user, "the resulting share is out of range"))
}
