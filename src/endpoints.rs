//! Core implementation of the trip operations.
//!
//! This is split from `routes` so that the logic can be tested without
//! going through HTTP, and so that it stays generic over the database.

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use log::{debug, info};
use tokio::sync::Mutex;

use crate::{
    balance::{compute_balances, simplify_settlements},
    database::Database,
    error::DatabaseError,
    formatter::{format_balance_csv, format_balance_report, BalanceReport},
    notifier::{ExpenseEvent, ExpenseNotifier},
    parser::{parse_expense, parse_members},
    splitter::resolve,
    types::{BalanceSheet, ExpenseId, ExpenseInput, Member, NewExpense, SavedExpense},
    validator::{validate_expense, validate_members, validate_members_exist},
};

pub async fn handle_add_members<D: Database>(
    trip_id: &str,
    members: &[Member],
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<()> {
    let members = parse_members(members)?;
    validate_members(&members)?;
    debug!("Adding members to trip {trip_id}: {:#?}", members);

    database.lock().await.upsert_members(trip_id, &members)?;
    Ok(())
}

pub async fn handle_list_members<D: Database>(
    trip_id: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Vec<Member>> {
    let mut members = database.lock().await.get_members(trip_id)?;
    members.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(members)
}

pub async fn handle_create_expense<D: Database, N: ExpenseNotifier + ?Sized>(
    trip_id: &str,
    input: &ExpenseInput,
    database: &Arc<Mutex<D>>,
    notifier: &N,
) -> anyhow::Result<SavedExpense> {
    let expense = prepare_expense(trip_id, input, database).await?;

    let saved = database.lock().await.add_expense(trip_id, expense)?;
    info!("Created expense {} in trip {trip_id}", saved.id);

    notifier.notify(ExpenseEvent::Created(saved.clone()));
    Ok(saved)
}

pub async fn handle_update_expense<D: Database, N: ExpenseNotifier + ?Sized>(
    trip_id: &str,
    expense_id: ExpenseId,
    input: &ExpenseInput,
    database: &Arc<Mutex<D>>,
    notifier: &N,
) -> anyhow::Result<SavedExpense> {
    let expense = prepare_expense(trip_id, input, database).await?;

    let saved = database
        .lock()
        .await
        .update_expense(trip_id, expense_id, expense)?;
    info!("Updated expense {expense_id} in trip {trip_id}");

    notifier.notify(ExpenseEvent::Updated(saved.clone()));
    Ok(saved)
}

pub async fn handle_delete_expense<D: Database, N: ExpenseNotifier + ?Sized>(
    trip_id: &str,
    expense_id: ExpenseId,
    database: &Arc<Mutex<D>>,
    notifier: &N,
) -> anyhow::Result<()> {
    database.lock().await.remove_expense(trip_id, expense_id)?;
    info!("Deleted expense {expense_id} in trip {trip_id}");

    notifier.notify(ExpenseEvent::Deleted {
        trip_id: trip_id.to_string(),
        expense_id,
    });
    Ok(())
}

pub async fn handle_get_expense<D: Database>(
    trip_id: &str,
    expense_id: ExpenseId,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<SavedExpense> {
    database
        .lock()
        .await
        .get_expense(trip_id, expense_id)?
        .ok_or_else(|| {
            DatabaseError::not_found(format!("expense {expense_id} was not found")).into()
        })
}

pub async fn handle_list_expenses<D: Database>(
    trip_id: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<Vec<SavedExpense>> {
    let expenses = database.lock().await.list_expenses_by_trip(trip_id)?;
    Ok(expenses)
}

/// The balances of a trip. When *simplify* is set, the settlements are
/// replaced by a shorter list that settles the same balances.
pub async fn handle_balance<D: Database>(
    trip_id: &str,
    simplify: bool,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<BalanceReport> {
    let (mut sheet, members) = load_balance_sheet(trip_id, database).await?;
    if simplify {
        sheet.settlements = simplify_settlements(&sheet.balances);
    }
    Ok(format_balance_report(&sheet, &members))
}

pub async fn handle_balance_csv<D: Database>(
    trip_id: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<String> {
    let (sheet, members) = load_balance_sheet(trip_id, database).await?;
    Ok(format_balance_csv(&sheet, &members))
}

async fn load_balance_sheet<D: Database>(
    trip_id: &str,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<(BalanceSheet, Vec<Member>)> {
    let database = database.lock().await;
    let expenses = database.list_expenses_by_trip(trip_id)?;
    let members = database.get_members(trip_id)?;
    debug!(
        "Computing balances of trip {trip_id} over {} expenses",
        expenses.len()
    );
    Ok((compute_balances(&expenses)?, members))
}

/// Parse, validate and resolve the split of an expense submitted by a client.
async fn prepare_expense<D: Database>(
    trip_id: &str,
    input: &ExpenseInput,
    database: &Arc<Mutex<D>>,
) -> anyhow::Result<NewExpense> {
    let expense = parse_expense(input)?;
    validate_expense(&expense)?;

    let mut users: Vec<&str> = vec![expense.payer.as_str()];
    let mut seen = HashSet::from([expense.payer.as_str()]);
    for participant in expense.policy.participants() {
        if seen.insert(participant.as_str()) {
            users.push(participant);
        }
    }
    validate_members_exist(&users, trip_id, database).await?;

    let split_with = resolve(expense.amount, &expense.payer, &expense.policy)?;
    debug!("Resolved split of `{}`: {:?}", expense.title, split_with);

    Ok(NewExpense {
        split_type: expense.policy.split_type(),
        title: expense.title,
        amount: expense.amount,
        payer: expense.payer,
        split_with,
        date: expense.date.unwrap_or_else(Utc::now),
    })
}
