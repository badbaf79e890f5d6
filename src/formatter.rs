//! Produce what is sent back to clients.
//! Amounts are converted from cents to currency units and user IDs are
//! joined with the names of the trip members.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Serialize;

use crate::types::{
    Amount, BalanceSheet, ExpenseId, Member, SavedExpense, Settlement, SplitLine, UserId, Weight,
};

const AMOUNT_TO_FLOAT_DIVISOR: f64 = 100.0;

#[derive(Debug, Serialize)]
pub struct BalanceReport {
    pub balances: Vec<BalanceEntry>,
    pub summary: Vec<SettlementEntry>,
}

#[derive(Debug, Serialize)]
pub struct BalanceEntry {
    pub user: Member,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct SettlementEntry {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseView {
    pub id: ExpenseId,
    pub trip_id: String,
    pub title: String,
    pub amount: f64,
    pub payer: UserId,
    pub split_type: &'static str,
    pub split_with: Vec<SplitLineView>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SplitLineView {
    pub user: UserId,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
}

pub fn format_amount(amount: Amount) -> String {
    format!("{:.2}", to_float(amount))
}

/// Precise up to 2^53 cents. Client amounts are capped at
/// [`crate::types::MAX_AMOUNT`], several orders of magnitude below that.
fn to_float(amount: Amount) -> f64 {
    amount as f64 / AMOUNT_TO_FLOAT_DIVISOR
}

fn decimal_to_float(d: &Decimal) -> Option<f64> {
    d.to_f64()
}

/// Names of the trip members by ID. Users that are no longer members
/// are shown by their ID.
struct Names<'a>(HashMap<&'a str, &'a str>);

impl<'a> Names<'a> {
    fn new(members: &'a [Member]) -> Names<'a> {
        Names(
            members
                .iter()
                .map(|m| (m.id.as_str(), m.name.as_str()))
                .collect(),
        )
    }

    fn get<'b>(&'b self, user: &'b str) -> &'b str {
        self.0.get(user).copied().unwrap_or(user)
    }
}

pub fn format_balance_report(sheet: &BalanceSheet, members: &[Member]) -> BalanceReport {
    let names = Names::new(members);

    let balances = sheet
        .balances
        .iter()
        .map(|(user, amount)| BalanceEntry {
            user: Member::new(user, names.get(user)),
            amount: to_float(*amount),
        })
        .collect();

    let summary = sheet
        .settlements
        .iter()
        .map(|s| format_settlement(s, &names))
        .collect();

    BalanceReport { balances, summary }
}

fn format_settlement(settlement: &Settlement, names: &Names) -> SettlementEntry {
    SettlementEntry {
        from: names.get(&settlement.from).to_string(),
        to: names.get(&settlement.to).to_string(),
        amount: to_float(settlement.amount),
    }
}

pub fn format_expense(expense: &SavedExpense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        trip_id: expense.trip_id.clone(),
        title: expense.title.clone(),
        amount: to_float(expense.amount),
        payer: expense.payer.clone(),
        split_type: expense.split_type.as_str(),
        split_with: expense.split_with.iter().map(format_split_line).collect(),
        date: expense.date,
    }
}

fn format_split_line(line: &SplitLine) -> SplitLineView {
    let (percentage, shares) = match &line.weight {
        Weight::Percentage(p) => (decimal_to_float(p), None),
        Weight::Shares(s) => (None, decimal_to_float(s)),
        Weight::None | Weight::Amount(_) => (None, None),
    };
    SplitLineView {
        user: line.user.clone(),
        amount: to_float(line.amount),
        percentage,
        shares,
    }
}

pub fn format_list_expenses(expenses: &[SavedExpense]) -> Vec<ExpenseView> {
    expenses.iter().map(format_expense).collect()
}

/// Render the balances as CSV with a `name,amount` header.
pub fn format_balance_csv(sheet: &BalanceSheet, members: &[Member]) -> String {
    let names = Names::new(members);
    sheet
        .balances
        .iter()
        .map(|(user, amount)| {
            format!("{},{}", escape_csv(names.get(user)), format_amount(*amount))
        })
        .fold("name,amount\n".to_string(), |a, b| a + &b + "\n")
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
