//! Compute the balance of a trip from its expenses.
//!
//! Balances are the net position of each user: positive if the user must
//! receive money, negative if the user owes money.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::BalanceOverflow;
use crate::types::{Amount, BalanceSheet, SavedExpense, Settlement, UserId};

/// Fold all *expenses* of a trip into balances and settlements.
///
/// Each expense credits its amount to the payer and debits every split line
/// to its participant. Every split line of a participant other than the payer
/// also produces a settlement from the participant to the payer. Settlements
/// are listed in expense order and are not netted: see [`simplify_settlements`].
///
/// Balances are listed in order of first appearance.
///
/// Fails if a balance does not fit in an [`Amount`].
pub fn compute_balances(expenses: &[SavedExpense]) -> Result<BalanceSheet, BalanceOverflow> {
    let mut balances: Vec<(UserId, Amount)> = vec![];
    let mut positions: HashMap<UserId, usize> = HashMap::new();
    let mut settlements = vec![];

    let mut add_to_balance = |user: &str, amount: Amount| -> Result<(), BalanceOverflow> {
        let position = *positions.entry(user.to_string()).or_insert_with(|| {
            balances.push((user.to_string(), 0));
            balances.len() - 1
        });
        let balance = &mut balances[position].1;
        *balance = balance.checked_add(amount).ok_or_else(|| BalanceOverflow {
            user: user.to_string(),
        })?;
        Ok(())
    };

    for expense in expenses {
        add_to_balance(&expense.payer, expense.amount)?;

        for line in &expense.split_with {
            add_to_balance(&line.user, -line.amount)?;

            if line.user != expense.payer && line.amount > 0 {
                settlements.push(Settlement::new(&line.user, &expense.payer, line.amount));
            }
        }
    }

    check_drift(&balances, expenses.len());

    Ok(BalanceSheet {
        balances,
        settlements,
    })
}

/// Percentage and share splits may leave up to one cent per participant
/// unassigned, so the balances of a trip only sum to zero approximately.
fn check_drift(balances: &[(UserId, Amount)], num_expenses: usize) {
    let sum: i128 = balances.iter().map(|(_, a)| i128::from(*a)).sum();
    if sum != 0 {
        debug!("Balances sum to {sum} over {num_expenses} expenses");
    }
    let allowed = num_expenses.max(1) as u128 * balances.len().max(1) as u128;
    if sum.unsigned_abs() > allowed {
        warn!("Balances should sum to 0 but they sum to {sum}: {:?}", balances);
    }
}

/// Get a list of settlements which settle the given *balances* with fewer
/// transfers than one per split line.
///
/// The algorithm works as follows:
/// - split users into debtors (negative balance) and creditors (positive balance)
/// - pick a debtor and a creditor
/// - compare debtor's debt (*d*) and creditor's credit (*c*):
///     * if bigger: let the debtor give *c* to creditor, then pick a new creditor
///     * if smaller: let the debtor give *d* to creditor, then pick a new debtor
///     * if equal: let the debtor give *d* to creditor, then pick a new debtor
///       and a new creditor
/// - stop when there are no more debtors/creditors
///
/// The solution is correct but not necessarily optimal, in the sense that it may
/// require more transfers than needed. The optimal solution is NP-complete and
/// this approximation is normally good enough. The output is sorted by debtors
/// first and creditors second.
pub fn simplify_settlements(balances: &[(UserId, Amount)]) -> Vec<Settlement> {
    let mut debtors: Vec<_> = balances
        .iter()
        .filter_map(|(u, a)| if *a < 0 { Some((u, a.saturating_neg())) } else { None })
        .collect();
    let mut creditors: Vec<_> = balances
        .iter()
        .filter_map(|(u, a)| if *a > 0 { Some((u, *a)) } else { None })
        .collect();

    // Reversed, because we pop from the back.
    debtors.sort_by(|x, y| y.0.cmp(x.0));
    creditors.sort_by(|x, y| y.0.cmp(x.0));

    let mut result = vec![];

    while let (Some(debtor), Some(creditor)) = (debtors.pop(), creditors.pop()) {
        let transfer = debtor.1.min(creditor.1);
        result.push(Settlement::new(debtor.0, creditor.0, transfer));

        if debtor.1 > transfer {
            debtors.push((debtor.0, debtor.1 - transfer));
        }
        if creditor.1 > transfer {
            creditors.push((creditor.0, creditor.1 - transfer));
        }
    }

    if !creditors.is_empty() {
        debug!("We ran out of debtors but we still have creditors: {:?}", creditors);
    } else if !debtors.is_empty() {
        debug!("We ran out of creditors but we still have debtors: {:?}", debtors);
    }

    result.sort_by(|s1, s2| s1.from.cmp(&s2.from).then_with(|| s1.to.cmp(&s2.to)));
    result
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use crate::types::{SplitLine, SplitType, Weight};

    use super::*;

    fn expense(id: i64, payer: &str, amount: Amount, lines: &[(&str, Amount)]) -> SavedExpense {
        SavedExpense {
            id,
            trip_id: "trip".to_string(),
            title: format!("expense {id}"),
            amount,
            payer: payer.to_string(),
            split_type: SplitType::ByAmount,
            split_with: lines
                .iter()
                .map(|(u, a)| SplitLine::new(u, Weight::Amount(*a), *a))
                .collect(),
            date: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn balance_of(sheet: &BalanceSheet, user: &str) -> Amount {
        sheet
            .balances
            .iter()
            .find(|(u, _)| u == user)
            .map(|(_, a)| *a)
            .expect("test")
    }

    #[test]
    fn test_single_even_expense() -> anyhow::Result<()> {
        let expenses = vec![expense(
            1,
            "u1",
            9000,
            &[("u1", 3000), ("u2", 3000), ("u3", 3000)],
        )];
        let sheet = compute_balances(&expenses)?;

        assert_eq!(
            sheet.balances,
            vec![
                ("u1".to_string(), 6000),
                ("u2".to_string(), -3000),
                ("u3".to_string(), -3000),
            ]
        );
        assert_eq!(
            sheet.settlements,
            vec![
                Settlement::new("u2", "u1", 3000),
                Settlement::new("u3", "u1", 3000),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_settlements_are_not_netted() -> anyhow::Result<()> {
        let expenses = vec![
            expense(1, "a", 1000, &[("b", 1000)]),
            expense(2, "b", 400, &[("a", 400)]),
        ];
        let sheet = compute_balances(&expenses)?;

        assert_eq!(balance_of(&sheet, "a"), 600);
        assert_eq!(balance_of(&sheet, "b"), -600);
        assert_eq!(
            sheet.settlements,
            vec![Settlement::new("b", "a", 1000), Settlement::new("a", "b", 400)]
        );
        Ok(())
    }

    #[test]
    fn test_payer_outside_split_and_zero_lines() -> anyhow::Result<()> {
        let expenses = vec![expense(1, "p", 500, &[("a", 500), ("b", 0)])];
        let sheet = compute_balances(&expenses)?;

        assert_eq!(balance_of(&sheet, "p"), 500);
        assert_eq!(balance_of(&sheet, "a"), -500);
        assert_eq!(balance_of(&sheet, "b"), 0);
        assert_eq!(sheet.settlements, vec![Settlement::new("a", "p", 500)]);
        Ok(())
    }

    #[test]
    fn test_balances_sum_to_zero() -> anyhow::Result<()> {
        let expenses = vec![
            expense(1, "p2", 2340, &[("p2", 550), ("p1", 550), ("a3", 1040), ("à3", 200)]),
            expense(2, "ã2", 3300, &[("ã2", 1100), ("à3", 1100), ("a3", 1100)]),
            expense(3, "p4", 2000, &[("p4", 1000), ("a3", 1000)]),
        ];
        let sheet = compute_balances(&expenses)?;

        assert_eq!(sheet.balances.len(), 6);
        assert_eq!(sheet.balances.iter().map(|(_, a)| a).sum::<Amount>(), 0);
        assert_eq!(balance_of(&sheet, "a3"), -3140);
        assert_eq!(balance_of(&sheet, "à3"), -1300);
        assert_eq!(balance_of(&sheet, "p1"), -550);
        assert_eq!(balance_of(&sheet, "ã2"), 2200);
        assert_eq!(balance_of(&sheet, "p2"), 1790);
        assert_eq!(balance_of(&sheet, "p4"), 1000);
        Ok(())
    }

    #[test]
    fn test_short_rounded_expense_drifts_by_at_most_its_lines() -> anyhow::Result<()> {
        // A percentage split of 10.00 into 33.33/33.33/33.34 leaves one cent unassigned.
        let expenses = vec![expense(1, "a", 1000, &[("a", 333), ("b", 333), ("c", 333)])];
        let sheet = compute_balances(&expenses)?;
        let sum: Amount = sheet.balances.iter().map(|(_, a)| a).sum();
        assert_eq!(sum, 1);
        Ok(())
    }

    #[test]
    fn test_empty_trip() -> anyhow::Result<()> {
        let sheet = compute_balances(&[])?;
        assert_eq!(sheet, BalanceSheet::default());
        assert!(simplify_settlements(&sheet.balances).is_empty());
        Ok(())
    }

    #[test]
    fn test_simplify_settlements() {
        let balances = vec![
            ("a3".to_string(), -3140),
            ("à3".to_string(), -1300),
            ("p1".to_string(), -550),
            ("ã2".to_string(), 2200),
            ("p2".to_string(), 1790),
            ("p4".to_string(), 1000),
        ];
        let settlements = simplify_settlements(&balances);

        assert_eq!(
            settlements,
            vec![
                Settlement::new("a3", "p2", 1790),
                Settlement::new("a3", "p4", 1000),
                Settlement::new("a3", "ã2", 350),
                Settlement::new("p1", "ã2", 550),
                Settlement::new("à3", "ã2", 1300),
            ]
        );
    }

    #[test]
    fn test_simplify_nets_opposite_debts() -> anyhow::Result<()> {
        let expenses = vec![
            expense(1, "a", 1000, &[("b", 1000)]),
            expense(2, "b", 400, &[("a", 400)]),
        ];
        let sheet = compute_balances(&expenses)?;
        assert_eq!(
            simplify_settlements(&sheet.balances),
            vec![Settlement::new("b", "a", 600)]
        );
        Ok(())
    }

    #[test]
    fn test_overflowing_balance_is_an_error() {
        let expenses = vec![
            expense(1, "a", Amount::MAX, &[("b", Amount::MAX)]),
            expense(2, "a", 1, &[("b", 1)]),
        ];
        assert_eq!(
            compute_balances(&expenses),
            Err(BalanceOverflow {
                user: "a".to_string()
            })
        );
    }
}
