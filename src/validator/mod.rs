//! Functions that check the validity of client input.
//!
//! These functions are called after the parsing phase and execute
//! checks that are not easily done by the parser.

mod database;
mod expense;

use crate::{error::InputError, types::Member};

pub use database::validate_members_exist;
pub use expense::validate_expense;

/// User IDs are opaque, but they must not be empty or contain whitespace.
pub fn is_valid_user_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(char::is_whitespace)
}

pub fn validate_user_id(id: &str) -> Result<(), InputError> {
    if is_valid_user_id(id) {
        Ok(())
    } else {
        Err(InputError::invalid_user_id(id))
    }
}

pub fn validate_members(members: &[Member]) -> Result<(), InputError> {
    for member in members {
        validate_user_id(&member.id)?;
        if member.name.trim().is_empty() {
            return Err(InputError::invalid_member_name(&member.id));
        }
    }
    Ok(())
}
