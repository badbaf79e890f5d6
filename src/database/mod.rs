//! Internal representation of data.

use crate::{
    error::DatabaseError,
    types::{ExpenseId, Member, NewExpense, SavedExpense},
};

type DatabaseResult<T> = Result<T, DatabaseError>;

pub mod sqlite;

/// This trait abstracts over the type of database.
///
/// The implementation could save the data in any suitable database or even in memory.
/// Expenses belong to a trip through its ID; each operation only ever sees the
/// expenses of the trip it is given.
pub trait Database {
    /// Add members to the given trip.
    ///
    /// If a member already exists, its name is updated.
    fn upsert_members(&mut self, trip_id: &str, members: &[Member]) -> DatabaseResult<()>;

    /// Get the list of all members of the given trip.
    fn get_members(&self, trip_id: &str) -> DatabaseResult<Vec<Member>>;

    /// Save a resolved expense and return it with its new ID.
    ///
    /// The payer and every participant must be members of the trip, otherwise
    /// nothing is saved and an error is returned.
    fn add_expense(&mut self, trip_id: &str, expense: NewExpense)
        -> DatabaseResult<SavedExpense>;

    /// Replace the expense with the given *expense_id*, including its whole split.
    ///
    /// If the expense does not exist, a not found error is returned.
    fn update_expense(
        &mut self,
        trip_id: &str,
        expense_id: ExpenseId,
        expense: NewExpense,
    ) -> DatabaseResult<SavedExpense>;

    /// Remove the expense with the given *expense_id*.
    ///
    /// The actual implementation could delete the expense or just mark it as deleted. The
    /// only requirement is that it does not show up later on. If the expense does not
    /// exist, a not found error is returned.
    fn remove_expense(&mut self, trip_id: &str, expense_id: ExpenseId) -> DatabaseResult<()>;

    /// Get the expense with the given *expense_id*, if it exists.
    fn get_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
    ) -> DatabaseResult<Option<SavedExpense>>;

    /// Get the list of all expenses of the given trip, oldest first.
    fn list_expenses_by_trip(&self, trip_id: &str) -> DatabaseResult<Vec<SavedExpense>>;
}
