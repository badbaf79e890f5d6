use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, Mutex};

mod balance;
mod config;
mod database;
mod endpoints;
mod error;
mod formatter;
mod notifier;
mod parser;
mod routes;
mod splitter;
mod types;
mod validator;

use crate::config::Config;
use crate::database::sqlite::SqliteDatabase;
use crate::notifier::{BroadcastNotifier, ExpenseEvent};
use crate::routes::{router, AppState};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!("Initializing database at {}...", config.database_path);
    let database = SqliteDatabase::new(&config.database_path).map_err(|e| {
        error!("Cannot initialize database: {}", e);
        e
    })?;
    let database = Arc::new(Mutex::new(database));

    let notifier = Arc::new(BroadcastNotifier::new(EVENT_CHANNEL_CAPACITY));
    spawn_event_log(notifier.subscribe());

    let state = AppState {
        database,
        notifier,
    };

    info!("Listening on {}", config.address);
    let listener = tokio::net::TcpListener::bind(config.address).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Log every expense event. Real-time delivery to clients would subscribe
/// to the same channel.
fn spawn_event_log(mut receiver: broadcast::Receiver<ExpenseEvent>) {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(ExpenseEvent::Created(e)) => {
                    info!("Expense {} created in trip {}", e.id, e.trip_id)
                }
                Ok(ExpenseEvent::Updated(e)) => {
                    info!("Expense {} updated in trip {}", e.id, e.trip_id)
                }
                Ok(ExpenseEvent::Deleted {
                    trip_id,
                    expense_id,
                }) => info!("Expense {expense_id} deleted in trip {trip_id}"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event log lagged behind, {skipped} events skipped")
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed");
                    break;
                }
            }
        }
    });
}
