//! The implementation of a data storage using Sqlite.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Params};
use rust_decimal::Decimal;
use tokio::task::block_in_place;

use crate::{
    error::DatabaseError,
    types::{
        Amount, ExpenseId, Member, NewExpense, SavedExpense, SplitLine, SplitType, Weight,
    },
};

use super::{Database, DatabaseResult};

mod schema;

const SELECT_EXPENSES: &str =
    "SELECT e.id, e.trip_id, e.title, e.amount, e.payer, e.split_type, e.date,
            s.user_id, s.weight, s.amount
     FROM expense e
     INNER JOIN expense_split s ON e.id = s.expense_id
     WHERE e.trip_id = ?1 AND e.deleted_at IS NULL";

pub struct SqliteDatabase {
    connection: Connection,
}

impl SqliteDatabase {
    /// Open the database at *path*, creating the tables if needed.
    /// Use `:memory:` for a database that lives as long as the connection.
    pub fn new(path: &str) -> DatabaseResult<SqliteDatabase> {
        block_in_place(|| {
            let connection = Connection::open(path)
                .map_err(|e| DatabaseError::new("cannot open database", e.into()))?;
            schema::create_all_tables(&connection)
                .map_err(|e| DatabaseError::new("cannot create tables", e))?;
            Ok(SqliteDatabase { connection })
        })
    }

    fn query_expenses<P: Params>(
        &self,
        query: &str,
        params: P,
    ) -> anyhow::Result<Vec<SavedExpense>> {
        let mut stmt = self.connection.prepare_cached(query)?;

        let expense_iter = stmt.query_map(params, |row| {
            Ok(ExpenseQuery {
                id: row.get(0)?,
                e_trip_id: row.get(1)?,
                e_title: row.get(2)?,
                e_amount: row.get(3)?,
                e_payer: row.get(4)?,
                e_split_type: row.get(5)?,
                e_date: row.get(6)?,
                s_user_id: row.get(7)?,
                s_weight: row.get(8)?,
                s_amount: row.get(9)?,
            })
        })?;

        let expenses: Result<Vec<_>, _> = expense_iter.collect();
        parse_expenses_query(expenses?)
    }
}

impl Database for SqliteDatabase {
    fn upsert_members(&mut self, trip_id: &str, members: &[Member]) -> DatabaseResult<()> {
        let mut fn_impl = || -> anyhow::Result<()> {
            let tx = self.connection.transaction()?;

            {
                let mut upsert_member_stmt = tx.prepare_cached(
                    "INSERT INTO member (trip_id, user_id, name) VALUES (?1, ?2, ?3)
                     ON CONFLICT (trip_id, user_id) DO UPDATE SET name = excluded.name",
                )?;
                for member in members {
                    upsert_member_stmt.execute(params![trip_id, &member.id, &member.name])?;
                }
            }

            tx.commit()?;

            Ok(())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot add members", e)))
    }

    fn get_members(&self, trip_id: &str) -> DatabaseResult<Vec<Member>> {
        let fn_impl = || -> anyhow::Result<Vec<Member>> {
            let mut stmt = self.connection.prepare_cached(
                "SELECT user_id, name FROM member
                 WHERE trip_id = ?1",
            )?;

            let member_iter = stmt.query_map(params![trip_id], |row| {
                Ok(Member {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;

            let members = member_iter.collect::<Result<_, _>>()?;
            Ok(members)
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get members", e)))
    }

    fn add_expense(
        &mut self,
        trip_id: &str,
        expense: NewExpense,
    ) -> DatabaseResult<SavedExpense> {
        let fn_impl = || -> anyhow::Result<SavedExpense> {
            let tx = self.connection.transaction()?;

            let expense_id: Option<ExpenseId> = {
                let mut insert_expense_stmt = tx.prepare_cached(
                    "INSERT INTO expense (trip_id, title, amount, payer, split_type, date)
                     SELECT ?1, ?2, ?3, user_id, ?4, ?5 FROM member
                     WHERE trip_id = ?1 AND user_id = ?6
                     RETURNING id",
                )?;

                insert_expense_stmt
                    .query_row(
                        params![
                            trip_id,
                            &expense.title,
                            &expense.amount,
                            expense.split_type.as_str(),
                            &expense.date,
                            &expense.payer,
                        ],
                        |row| row.get(0),
                    )
                    .optional()?
            };

            let expense_id = expense_id.ok_or_else(|| {
                DatabaseError::concurrency(format!("the payer `{}` was not found", expense.payer))
            })?;

            debug!("expense_id is {expense_id}");

            insert_split(&tx, trip_id, expense_id, &expense.split_with)?;

            tx.commit()?;

            Ok(expense.into_saved(expense_id, trip_id))
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot save expense", e)))
    }

    fn update_expense(
        &mut self,
        trip_id: &str,
        expense_id: ExpenseId,
        expense: NewExpense,
    ) -> DatabaseResult<SavedExpense> {
        debug!("Updating expense. Trip ID: {trip_id}. Expense ID: {expense_id}");
        let fn_impl = || -> anyhow::Result<SavedExpense> {
            let tx = self.connection.transaction()?;

            let existing: Option<ExpenseId> = tx
                .query_row(
                    "SELECT id FROM expense
                     WHERE trip_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                    params![trip_id, &expense_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_none() {
                return Err(DatabaseError::not_found(format!(
                    "expense {expense_id} was not found"
                ))
                .into());
            }

            let num_updated_rows = tx.execute(
                "UPDATE expense
                 SET title = ?1, amount = ?2, payer = ?3, split_type = ?4, date = ?5,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?6
                 AND EXISTS (SELECT 1 FROM member WHERE trip_id = ?7 AND user_id = ?3)",
                params![
                    &expense.title,
                    &expense.amount,
                    &expense.payer,
                    expense.split_type.as_str(),
                    &expense.date,
                    &expense_id,
                    trip_id,
                ],
            )?;
            if num_updated_rows == 0 {
                return Err(DatabaseError::concurrency(format!(
                    "the payer `{}` was not found",
                    expense.payer
                ))
                .into());
            }

            tx.execute(
                "DELETE FROM expense_split WHERE expense_id = ?1",
                params![&expense_id],
            )?;
            insert_split(&tx, trip_id, expense_id, &expense.split_with)?;

            tx.commit()?;

            Ok(expense.into_saved(expense_id, trip_id))
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot update expense", e)))
    }

    fn remove_expense(&mut self, trip_id: &str, expense_id: ExpenseId) -> DatabaseResult<()> {
        debug!("Deleting expense. Trip ID: {trip_id}. Expense ID: {expense_id}");
        let fn_impl = || -> anyhow::Result<()> {
            let num_deleted_rows = self.connection.execute(
                "UPDATE expense SET deleted_at = CURRENT_TIMESTAMP
                 WHERE trip_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                params![trip_id, &expense_id],
            )?;

            if num_deleted_rows == 0 {
                Err(DatabaseError::not_found(format!("expense {expense_id} was not found")).into())
            } else {
                Ok(())
            }
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot delete expense", e)))
    }

    fn get_expense(
        &self,
        trip_id: &str,
        expense_id: ExpenseId,
    ) -> DatabaseResult<Option<SavedExpense>> {
        let fn_impl = || -> anyhow::Result<Option<SavedExpense>> {
            let query = format!("{SELECT_EXPENSES} AND e.id = ?2 ORDER BY s.position");
            let expenses = self.query_expenses(&query, params![trip_id, &expense_id])?;
            Ok(expenses.into_iter().next())
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot get expense", e)))
    }

    fn list_expenses_by_trip(&self, trip_id: &str) -> DatabaseResult<Vec<SavedExpense>> {
        let fn_impl = || -> anyhow::Result<Vec<SavedExpense>> {
            let query = format!("{SELECT_EXPENSES} ORDER BY e.date, e.id, s.position");
            self.query_expenses(&query, params![trip_id])
        };

        block_in_place(|| fn_impl().map_err(|e| map_error("cannot list expenses", e)))
    }
}

/// Insert the split lines of an expense, checking that each participant is a
/// member of the trip.
fn insert_split(
    connection: &Connection,
    trip_id: &str,
    expense_id: ExpenseId,
    split_with: &[SplitLine],
) -> anyhow::Result<()> {
    let mut insert_split_stmt = connection.prepare_cached(
        "INSERT INTO expense_split (expense_id, position, user_id, weight, amount)
         SELECT ?1, ?2, user_id, ?3, ?4 FROM member
         WHERE trip_id = ?5 AND user_id = ?6",
    )?;

    for (position, line) in split_with.iter().enumerate() {
        let num_inserted_rows = insert_split_stmt.execute(params![
            &expense_id,
            &(position as i64),
            &weight_to_sql(&line.weight),
            &line.amount,
            trip_id,
            &line.user,
        ])?;
        if num_inserted_rows == 0 {
            return Err(DatabaseError::concurrency(format!(
                "the participant `{}` was not found",
                line.user
            ))
            .into());
        }
    }

    Ok(())
}

fn weight_to_sql(weight: &Weight) -> Option<String> {
    match weight {
        Weight::None => None,
        Weight::Amount(a) => Some(a.to_string()),
        Weight::Percentage(p) => Some(p.to_string()),
        Weight::Shares(s) => Some(s.to_string()),
    }
}

fn weight_from_sql(split_type: SplitType, weight: Option<String>) -> anyhow::Result<Weight> {
    let weight = match (split_type, weight) {
        (SplitType::Even | SplitType::SelfPaid, _) => Weight::None,
        (SplitType::ByAmount, Some(w)) => Weight::Amount(w.parse()?),
        (SplitType::ByPercentage, Some(w)) => Weight::Percentage(Decimal::from_str(&w)?),
        (SplitType::ByShares, Some(w)) => Weight::Shares(Decimal::from_str(&w)?),
        (split_type, None) => anyhow::bail!("missing weight for a {split_type} split"),
    };
    Ok(weight)
}

/// Rows come ordered by expense, so the lines of an expense are contiguous.
fn parse_expenses_query(rows: Vec<ExpenseQuery>) -> anyhow::Result<Vec<SavedExpense>> {
    let mut result: Vec<SavedExpense> = vec![];

    for row in rows {
        let split_type: SplitType = row.e_split_type.parse()?;
        let line = SplitLine {
            user: row.s_user_id,
            weight: weight_from_sql(split_type, row.s_weight)?,
            amount: row.s_amount,
        };

        match result.last_mut() {
            Some(expense) if expense.id == row.id => expense.split_with.push(line),
            _ => result.push(SavedExpense {
                id: row.id,
                trip_id: row.e_trip_id,
                title: row.e_title,
                amount: row.e_amount,
                payer: row.e_payer,
                split_type,
                split_with: vec![line],
                date: row.e_date,
            }),
        }
    }

    Ok(result)
}

struct ExpenseQuery {
    id: ExpenseId,
    e_trip_id: String,
    e_title: String,
    e_amount: Amount,
    e_payer: String,
    e_split_type: String,
    e_date: DateTime<Utc>,
    s_user_id: String,
    s_weight: Option<String>,
    s_amount: Amount,
}

fn map_error<T: AsRef<str>>(message: T, e: anyhow::Error) -> DatabaseError {
    match e.downcast::<DatabaseError>() {
        Ok(e) => e,
        Err(e) => DatabaseError::new(message, e),
    }
}
