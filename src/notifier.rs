//! Publish expense changes to whoever is listening.

use log::debug;
use tokio::sync::broadcast;

use crate::types::{ExpenseId, SavedExpense, TripId};

#[derive(Clone, Debug, PartialEq)]
pub enum ExpenseEvent {
    Created(SavedExpense),
    Updated(SavedExpense),
    Deleted {
        trip_id: TripId,
        expense_id: ExpenseId,
    },
}

impl ExpenseEvent {
    pub fn trip_id(&self) -> &str {
        match self {
            ExpenseEvent::Created(e) | ExpenseEvent::Updated(e) => &e.trip_id,
            ExpenseEvent::Deleted { trip_id, .. } => trip_id,
        }
    }
}

/// Receives an event after each successful change to the expenses of a trip.
///
/// Notifying must never fail the change that caused it.
pub trait ExpenseNotifier: Send + Sync {
    fn notify(&self, event: ExpenseEvent);
}

pub struct BroadcastNotifier {
    sender: broadcast::Sender<ExpenseEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> BroadcastNotifier {
        let (sender, _) = broadcast::channel(capacity);
        BroadcastNotifier { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExpenseEvent> {
        self.sender.subscribe()
    }
}

impl ExpenseNotifier for BroadcastNotifier {
    fn notify(&self, event: ExpenseEvent) {
        let trip_id = event.trip_id().to_string();
        if let Err(e) = self.sender.send(event) {
            debug!("Nobody is listening for events of trip {trip_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    #[test]
    fn test_send_without_receivers() {
        let notifier = BroadcastNotifier::new(4);
        notifier.notify(ExpenseEvent::Deleted {
            trip_id: "trip".to_string(),
            expense_id: 1,
        });
    }

    #[test]
    fn test_subscribers_receive_events() -> anyhow::Result<()> {
        let notifier = BroadcastNotifier::new(4);
        let mut receiver = notifier.subscribe();

        let event = ExpenseEvent::Deleted {
            trip_id: "trip".to_string(),
            expense_id: 7,
        };
        notifier.notify(event.clone());

        assert_eq!(receiver.try_recv()?, event);
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
        Ok(())
    }
}
