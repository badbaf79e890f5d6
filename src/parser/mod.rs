//! Parse the client input.

mod amount;
mod expense;

pub use expense::parse_expense;

use crate::{error::InputError, types::Member};

/// Trim the members of a trip, making sure there is at least one.
pub fn parse_members(members: &[Member]) -> Result<Vec<Member>, InputError> {
    let members: Vec<_> = members
        .iter()
        .map(|m| Member::new(m.id.trim(), m.name.trim()))
        .collect();
    if members.is_empty() {
        Err(InputError::members_not_provided())
    } else {
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members() -> anyhow::Result<()> {
        let members = parse_members(&[Member::new(" u1", "Alice "), Member::new("u2", "Bob")])?;
        assert_eq!(members, vec![Member::new("u1", "Alice"), Member::new("u2", "Bob")]);

        let result = parse_members(&[]);
        assert!(result.is_err());
        Ok(())
    }
}
