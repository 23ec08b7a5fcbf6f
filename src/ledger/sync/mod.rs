//! Ledger synchronization module.
//!
//! This module holds the moving parts of the synchronization engine:
//!
//! - `committer`: the single writer serializing all document mutations
//! - `events`: the broadcast channel announcing data updates and offline
//!   conditions
//! - `orchestrator`: the per-run algorithm coordinating push and pull phases
//! - `remote`: the consumed interface of the remote accounting repository
//! - `report`: statistics about one synchronization run
//!
//! The orchestrator reads through the document store, writes through the
//! committer, and talks to the remote repository through the `remote` seam
//! only, so every collaborator can be substituted in tests.

/// Single-writer mutation queue over the document store
pub mod committer;
/// Engine event channel
pub mod events;
/// Top-level synchronization algorithm
pub mod orchestrator;
/// Remote accounting repository interface
pub mod remote;
/// Per-run statistics
pub mod report;

pub use committer::DocumentCommitter;
pub use events::{EventReceiver, EventSender, LedgerEvent};
pub use orchestrator::{SyncError, SyncOrchestrator};
pub use remote::{NewEntry, RemoteAccounting, RemoteError, RemoteLedgerRepository};
pub use report::{AccountingReport, SyncReport};
