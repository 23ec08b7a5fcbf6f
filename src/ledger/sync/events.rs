//! Event channel for the synchronization engine.
//!
//! The committer and the orchestrator announce state changes through a
//! broadcast channel instead of a UI-framework event type. Sinks subscribe at
//! construction time; publishing with no subscribers is not an error.

use crate::ledger::document::LedgerDocument;
use crate::ledger::schema::ValidationError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Notifications published by the synchronization engine.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    /// A committer batch drained with at least one successful mutation.
    /// Carries the final document and the last-updated timestamp.
    DataUpdated {
        document: Arc<LedgerDocument>,
        at: DateTime<Utc>,
    },
    /// One mutation was discarded because it would have left the document
    /// schema-invalid. The rest of its batch proceeded.
    MutationRejected { error: ValidationError },
    /// The remote accounting service could not be reached.
    Offline,
}

pub type EventSender = broadcast::Sender<LedgerEvent>;
pub type EventReceiver = broadcast::Receiver<LedgerEvent>;

/// Create the engine's event channel.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}
