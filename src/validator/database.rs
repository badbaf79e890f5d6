//! Functions that check the validity of client input by running queries to the database.
//!
//! These checks are necessary in order to return nice error messages,
//! but the database should still re-run the checks and throw an error when the actual
//! query is run (in that case, a generic concurrency error is enough).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::InputError;

/// Check that all users provided by the client are members of the trip.
pub async fn validate_members_exist<D: Database, T: AsRef<str>>(
    users: &[T],
    trip_id: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<()> {
    if !users.is_empty() {
        let members = database.lock().await.get_members(trip_id)?;
        let members: HashSet<_> = members.into_iter().map(|m| m.id).collect();

        for user in users {
            if !members.contains(user.as_ref()) {
                return Err(InputError::unregistered_member(user.as_ref()).into());
            }
        }
    }
    Ok(())
}
