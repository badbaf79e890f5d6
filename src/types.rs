use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SplitError;

/// Money in cents.
pub type Amount = i64;

/// The largest amount accepted from clients, 100,000,000,000.00. It keeps the
/// balances of a trip far from `i64` overflow and exactly representable as `f64`.
pub const MAX_AMOUNT: Amount = 10_000_000_000_000;

pub type UserId = String;
pub type TripId = String;
pub type ExpenseId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitType {
    Even,
    ByAmount,
    ByPercentage,
    ByShares,
    SelfPaid,
}

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitType::Even => "even",
            SplitType::ByAmount => "byAmount",
            SplitType::ByPercentage => "byPercentage",
            SplitType::ByShares => "byShares",
            SplitType::SelfPaid => "self",
        }
    }
}

impl FromStr for SplitType {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "even" => Ok(SplitType::Even),
            "byAmount" => Ok(SplitType::ByAmount),
            "byPercentage" => Ok(SplitType::ByPercentage),
            "byShares" => Ok(SplitType::ByShares),
            "self" => Ok(SplitType::SelfPaid),
            other => Err(SplitError::invalid_split_type(other.to_string())),
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an expense is divided. Each variant only carries the weight its
/// resolver needs.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitPolicy {
    Even(Vec<UserId>),
    ByAmount(Vec<(UserId, Amount)>),
    ByPercentage(Vec<(UserId, Decimal)>),
    ByShares(Vec<(UserId, Decimal)>),
    SelfPaid,
}

impl SplitPolicy {
    pub fn split_type(&self) -> SplitType {
        match self {
            SplitPolicy::Even(_) => SplitType::Even,
            SplitPolicy::ByAmount(_) => SplitType::ByAmount,
            SplitPolicy::ByPercentage(_) => SplitType::ByPercentage,
            SplitPolicy::ByShares(_) => SplitType::ByShares,
            SplitPolicy::SelfPaid => SplitType::SelfPaid,
        }
    }

    pub fn participants(&self) -> Vec<&UserId> {
        match self {
            SplitPolicy::Even(users) => users.iter().collect(),
            SplitPolicy::ByAmount(users) => users.iter().map(|(u, _)| u).collect(),
            SplitPolicy::ByPercentage(users) => users.iter().map(|(u, _)| u).collect(),
            SplitPolicy::ByShares(users) => users.iter().map(|(u, _)| u).collect(),
            SplitPolicy::SelfPaid => vec![],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Weight {
    None,
    Amount(Amount),
    Percentage(Decimal),
    Shares(Decimal),
}

/// One resolved line of a split: *user* owes *amount* of the expense.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitLine {
    pub user: UserId,
    pub weight: Weight,
    pub amount: Amount,
}

/// An expense whose split has been resolved, ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewExpense {
    pub title: String,
    pub amount: Amount,
    pub payer: UserId,
    pub split_type: SplitType,
    pub split_with: Vec<SplitLine>,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SavedExpense {
    pub id: ExpenseId,
    pub trip_id: TripId,
    pub title: String,
    pub amount: Amount,
    pub payer: UserId,
    pub split_type: SplitType,
    pub split_with: Vec<SplitLine>,
    pub date: DateTime<Utc>,
}

/// A number as sent by a client: either a JSON number or a string.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(serde_json::Number),
    Text(String),
}

impl NumberInput {
    pub fn as_text(&self) -> String {
        match self {
            NumberInput::Number(n) => n.to_string(),
            NumberInput::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
    pub title: String,
    pub amount: NumberInput,
    pub payer: UserId,
    #[serde(default)]
    pub split_type: Option<String>,
    #[serde(default)]
    pub split_with: Vec<SplitWithInput>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SplitWithInput {
    pub user: UserId,
    #[serde(default)]
    pub amount: Option<NumberInput>,
    #[serde(default)]
    pub percentage: Option<NumberInput>,
    #[serde(default)]
    pub shares: Option<NumberInput>,
}

/// An expense as submitted, before its split is resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedExpense {
    pub title: String,
    pub amount: Amount,
    pub payer: UserId,
    pub policy: SplitPolicy,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub from: UserId,
    pub to: UserId,
    pub amount: Amount,
}

/// Net position of every user of a trip, plus the debts that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    pub balances: Vec<(UserId, Amount)>,
    pub settlements: Vec<Settlement>,
}

impl SplitLine {
    pub fn new(user: &str, weight: Weight, amount: Amount) -> SplitLine {
        SplitLine {
            user: user.to_string(),
            weight,
            amount,
        }
    }
}

impl NewExpense {
    pub fn into_saved(self, id: ExpenseId, trip_id: &str) -> SavedExpense {
        SavedExpense {
            id,
            trip_id: trip_id.to_string(),
            title: self.title,
            amount: self.amount,
            payer: self.payer,
            split_type: self.split_type,
            split_with: self.split_with,
            date: self.date,
        }
    }
}

impl Member {
    pub fn new(id: &str, name: &str) -> Member {
        Member {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

impl Settlement {
    pub fn new(from: &str, to: &str, amount: Amount) -> Settlement {
        Settlement {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }
}
