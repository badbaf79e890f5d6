//! Functions that check the validity of an expense parsed from client input.
//!
//! The split itself is checked while it is resolved; these are the checks
//! that do not depend on the split policy.

use std::collections::HashSet;

use crate::error::InputError;
use crate::types::ParsedExpense;

use super::validate_user_id;

/// Some sanity checks on the expense that was submitted.
///
/// List of checks:
/// - the title is not empty
/// - the payer and all participants have a valid ID
/// - a participant appears at most once in the split
pub fn validate_expense(expense: &ParsedExpense) -> Result<(), InputError> {
    has_title(expense)?;
    valid_user_ids(expense)?;
    no_duplicate_participants(expense)?;
    Ok(())
}

fn has_title(expense: &ParsedExpense) -> Result<(), InputError> {
    if expense.title.trim().is_empty() {
        Err(InputError::missing_title())
    } else {
        Ok(())
    }
}

fn valid_user_ids(expense: &ParsedExpense) -> Result<(), InputError> {
    validate_user_id(&expense.payer)?;
    for participant in expense.policy.participants() {
        validate_user_id(participant)?;
    }
    Ok(())
}

fn no_duplicate_participants(expense: &ParsedExpense) -> Result<(), InputError> {
    // A HashSet returns false upon insertion if the element is already present.
    let mut uniq = HashSet::new();
    match expense
        .policy
        .participants()
        .into_iter()
        .find(|p| !uniq.insert(*p))
    {
        Some(duplicate) => Err(InputError::duplicate_participant(duplicate)),
        None => Ok(()),
    }
}
