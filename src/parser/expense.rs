//! Parse an expense submitted by a client.
//!
//! The weights a client sends are loose (every participant may carry an
//! amount, a percentage or a number of shares); here they are turned into the
//! split policy named by the split type, keeping only the weight it needs.

use rust_decimal::Decimal;

use crate::{
    error::SplitError,
    types::{
        Amount, ExpenseInput, NumberInput, ParsedExpense, SplitPolicy, SplitType,
        SplitWithInput, UserId,
    },
};

use super::amount::{parse_amount, parse_decimal};

pub fn parse_expense(input: &ExpenseInput) -> anyhow::Result<ParsedExpense> {
    let amount = parse_amount(&input.amount.as_text())?;
    let split_type = parse_split_type(input.split_type.as_deref(), &input.split_with)?;
    let policy = parse_policy(split_type, &input.split_with)?;

    Ok(ParsedExpense {
        title: input.title.trim().to_string(),
        amount,
        payer: input.payer.trim().to_string(),
        policy,
        date: input.date,
    })
}

/// Without an explicit split type, an expense with no participants is paid
/// for the payer only, otherwise it is split evenly.
fn parse_split_type(
    split_type: Option<&str>,
    split_with: &[SplitWithInput],
) -> Result<SplitType, SplitError> {
    match split_type.map(str::trim) {
        Some(s) => s.parse(),
        None if split_with.is_empty() => Ok(SplitType::SelfPaid),
        None => Ok(SplitType::Even),
    }
}

fn parse_policy(split_type: SplitType, split_with: &[SplitWithInput]) -> anyhow::Result<SplitPolicy> {
    let user = |p: &SplitWithInput| p.user.trim().to_string();

    let policy = match split_type {
        SplitType::SelfPaid => SplitPolicy::SelfPaid,
        SplitType::Even => SplitPolicy::Even(split_with.iter().map(user).collect()),
        SplitType::ByAmount => SplitPolicy::ByAmount(
            split_with
                .iter()
                .map(|p| -> anyhow::Result<(UserId, Amount)> {
                    let amount = required(p, &p.amount, "amount")?;
                    Ok((user(p), parse_amount(&amount.as_text())?))
                })
                .collect::<anyhow::Result<_>>()?,
        ),
        SplitType::ByPercentage => SplitPolicy::ByPercentage(
            split_with
                .iter()
                .map(|p| -> anyhow::Result<(UserId, Decimal)> {
                    let percentage = required(p, &p.percentage, "percentage")?;
                    Ok((user(p), parse_decimal("percentage", &percentage.as_text())?))
                })
                .collect::<anyhow::Result<_>>()?,
        ),
        SplitType::ByShares => SplitPolicy::ByShares(
            split_with
                .iter()
                .map(|p| -> anyhow::Result<(UserId, Decimal)> {
                    let shares = required(p, &p.shares, "shares")?;
                    Ok((user(p), parse_decimal("shares", &shares.as_text())?))
                })
                .collect::<anyhow::Result<_>>()?,
        ),
    };

    Ok(policy)
}

fn required<'a>(
    participant: &SplitWithInput,
    weight: &'a Option<NumberInput>,
    field: &'static str,
) -> Result<&'a NumberInput, SplitError> {
    weight
        .as_ref()
        .ok_or_else(|| SplitError::missing_weight(participant.user.trim(), field))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::InputError;

    use super::*;

    fn input(value: serde_json::Value) -> ExpenseInput {
        serde_json::from_value(value).expect("test")
    }

    #[test]
    fn test_parse_even() -> anyhow::Result<()> {
        let expense = parse_expense(&input(json!({
            "title": " Dinner ",
            "amount": 90,
            "payer": "u1",
            "splitType": "even",
            "splitWith": [{"user": "u1"}, {"user": "u2"}, {"user": " u3 "}]
        })))?;

        assert_eq!(expense.title, "Dinner");
        assert_eq!(expense.amount, 9000);
        assert_eq!(expense.payer, "u1");
        assert_eq!(
            expense.policy,
            SplitPolicy::Even(vec!["u1".to_string(), "u2".to_string(), "u3".to_string()])
        );
        assert_eq!(expense.date, None);
        Ok(())
    }

    #[test]
    fn test_default_split_type() -> anyhow::Result<()> {
        let expense = parse_expense(&input(json!({
            "title": "Taxi", "amount": "12.50", "payer": "u1"
        })))?;
        assert_eq!(expense.amount, 1250);
        assert_eq!(expense.policy, SplitPolicy::SelfPaid);

        let expense = parse_expense(&input(json!({
            "title": "Taxi", "amount": 12.5, "payer": "u1",
            "splitWith": [{"user": "u2"}]
        })))?;
        assert_eq!(expense.policy, SplitPolicy::Even(vec!["u2".to_string()]));
        Ok(())
    }

    #[test]
    fn test_parse_weighted_policies() -> anyhow::Result<()> {
        let expense = parse_expense(&input(json!({
            "title": "Hotel", "amount": 100, "payer": "u1", "splitType": "byAmount",
            "splitWith": [{"user": "u1", "amount": 40}, {"user": "u2", "amount": "60.00"}]
        })))?;
        assert_eq!(
            expense.policy,
            SplitPolicy::ByAmount(vec![("u1".to_string(), 4000), ("u2".to_string(), 6000)])
        );

        let expense = parse_expense(&input(json!({
            "title": "Hotel", "amount": 100, "payer": "u1", "splitType": "byPercentage",
            "splitWith": [{"user": "u1", "percentage": 33.33}, {"user": "u2", "percentage": "66.67"}]
        })))?;
        assert_eq!(
            expense.policy,
            SplitPolicy::ByPercentage(vec![
                ("u1".to_string(), Decimal::new(3333, 2)),
                ("u2".to_string(), Decimal::new(6667, 2)),
            ])
        );

        let expense = parse_expense(&input(json!({
            "title": "Hotel", "amount": 100, "payer": "u1", "splitType": "byShares",
            "splitWith": [{"user": "u1", "shares": 1, "amount": 3}, {"user": "u2", "shares": 2}]
        })))?;
        assert_eq!(
            expense.policy,
            SplitPolicy::ByShares(vec![
                ("u1".to_string(), Decimal::from(1)),
                ("u2".to_string(), Decimal::from(2)),
            ])
        );
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let result = parse_expense(&input(json!({
            "title": "Hotel", "amount": 100, "payer": "u1", "splitType": "fair",
            "splitWith": [{"user": "u1"}]
        })));
        let e = result.expect_err("test");
        assert_eq!(
            e.downcast_ref::<SplitError>(),
            Some(&SplitError::InvalidSplitType("fair".to_string()))
        );

        let result = parse_expense(&input(json!({
            "title": "Hotel", "amount": 100, "payer": "u1", "splitType": "byShares",
            "splitWith": [{"user": "u1", "shares": 1}, {"user": "u2", "percentage": 50}]
        })));
        let e = result.expect_err("test");
        assert_eq!(
            e.downcast_ref::<SplitError>(),
            Some(&SplitError::missing_weight("u2", "shares"))
        );

        let result = parse_expense(&input(json!({
            "title": "Hotel", "amount": "1O0", "payer": "u1"
        })));
        let e = result.expect_err("test");
        assert!(matches!(
            e.downcast_ref::<InputError>(),
            Some(InputError::InvalidAmount(_))
        ));
    }
}
