use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Amount, UserId, MAX_AMOUNT};

/// Everything that can go wrong while resolving a split. All of these
/// mean the caller sent something invalid.
#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("invalid split type `{0}`: expected one of even, byAmount, byPercentage, byShares, self")]
    InvalidSplitType(String),

    #[error("there must be at least one participant to split the expense with")]
    EmptyParticipants,

    #[error("split amounts add up to {}, which differs from the expense amount {} by {}", format_cents(.total), format_cents(.amount), format_cents(.difference))]
    SplitMismatch {
        amount: Amount,
        total: Amount,
        difference: Amount,
    },

    #[error("total percentage must equal 100%, got {0}%")]
    InvalidPercentageTotal(Decimal),

    #[error("total shares must be greater than zero, got {0}")]
    InvalidShareTotal(Decimal),

    #[error("the expense amount must be positive, got {}", format_cents(.0))]
    NonPositiveAmount(Amount),

    #[error("invalid weight for `{user}`: {reason}")]
    InvalidWeight { user: String, reason: String },

    #[error("`{user}` is missing the `{field}` field required by this split type")]
    MissingWeight { user: String, field: &'static str },
}

impl SplitError {
    pub fn invalid_split_type(split_type: String) -> Self {
        SplitError::InvalidSplitType(split_type)
    }

    pub fn split_mismatch(amount: Amount, total: Amount) -> Self {
        SplitError::SplitMismatch {
            amount,
            total,
            difference: Amount::try_from(amount.abs_diff(total)).unwrap_or(Amount::MAX),
        }
    }

    pub fn invalid_weight(user: &str, reason: &str) -> Self {
        SplitError::InvalidWeight {
            user: user.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_weight(user: &str, field: &'static str) -> Self {
        SplitError::MissingWeight {
            user: user.to_string(),
            field,
        }
    }
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid amount `{0}`: expected a number with at most two decimal places")]
    InvalidAmount(String),

    #[error("amount `{0}` is out of range: the largest accepted amount is {max}", max = format_cents(&MAX_AMOUNT))]
    AmountOutOfRange(String),

    #[error("invalid {field} `{value}`: expected a decimal number")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("the expense title cannot be empty")]
    MissingTitle,

    #[error("invalid user ID `{0}`: IDs cannot be empty or contain whitespace")]
    InvalidUserId(String),

    #[error("invalid name for `{0}`: names cannot be empty")]
    InvalidMemberName(String),

    #[error("there must be at least one member. Format must be '[{{\"id\": ..., \"name\": ...}}]'")]
    MembersNotProvided,

    #[error("`{0}` is not a member of this trip")]
    UnregisteredMember(String),

    #[error("`{0}` appears more than once in the split")]
    DuplicateParticipant(String),
}

impl InputError {
    pub fn invalid_amount(amount: &str) -> Self {
        InputError::InvalidAmount(amount.to_string())
    }

    pub fn amount_out_of_range(amount: &str) -> Self {
        InputError::AmountOutOfRange(amount.to_string())
    }

    pub fn invalid_decimal(field: &'static str, value: &str) -> Self {
        InputError::InvalidDecimal {
            field,
            value: value.to_string(),
        }
    }

    pub fn missing_title() -> Self {
        InputError::MissingTitle
    }

    pub fn invalid_user_id(id: &str) -> Self {
        InputError::InvalidUserId(id.to_string())
    }

    pub fn invalid_member_name(id: &str) -> Self {
        InputError::InvalidMemberName(id.to_string())
    }

    pub fn members_not_provided() -> Self {
        InputError::MembersNotProvided
    }

    pub fn unregistered_member(id: &str) -> Self {
        InputError::UnregisteredMember(id.to_string())
    }

    pub fn duplicate_participant(id: &str) -> Self {
        InputError::DuplicateParticipant(id.to_string())
    }
}

/// A balance of a trip does not fit in an `Amount`.
#[derive(Error, Debug, PartialEq)]
#[error("the balance of `{user}` is out of range")]
pub struct BalanceOverflow {
    pub user: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    NotFound,
    Concurrency,
    Other,
}

#[derive(Error, Debug)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
    kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new<T: AsRef<str>>(message: T, e: anyhow::Error) -> Self {
        DatabaseError {
            message: format!("{}: {e}", message.as_ref()),
            kind: DatabaseErrorKind::Other,
        }
    }

    pub fn not_found<T: AsRef<str>>(message: T) -> Self {
        DatabaseError {
            message: message.as_ref().to_string(),
            kind: DatabaseErrorKind::NotFound,
        }
    }

    pub fn concurrency<T: AsRef<str>>(message: T) -> Self {
        DatabaseError {
            message: format!(
                "{}; the data was probably modified concurrently",
                message.as_ref()
            ),
            kind: DatabaseErrorKind::Concurrency,
        }
    }

    pub fn kind(&self) -> DatabaseErrorKind {
        self.kind
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid address `{0}`: expected host:port")]
    InvalidAddress(String),

    #[error("invalid value for {0}: the value is not valid unicode")]
    NotUnicode(&'static str),
}

fn format_cents(amount: &Amount) -> String {
    crate::formatter::format_amount(*amount)
}
