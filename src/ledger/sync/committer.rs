//! Mutation committer: the single writer of the ledger document.
//!
//! Producers enqueue mutation functions; an unbounded channel feeds exactly
//! one consumer task spawned at construction. Each mutation runs a full
//! lock→load→apply→validate→persist cycle under the document lock. A
//! validation failure discards the offending node and never reaches disk;
//! it does not stop the rest of the queue. After a batch drains with at
//! least one success, a single `DataUpdated` event is published.
//!
//! Cancellation is cooperative: a watch flag is observed between mutations,
//! and disposal awaits the worker's completion instead of sleep-polling.

use crate::ledger::document::LedgerDocument;
use crate::ledger::schema::DocumentSchema;
use crate::ledger::store::{DocumentStore, StoreError};
use crate::ledger::sync::events::{EventSender, LedgerEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A pure mutation of the ledger document, applied by the worker.
pub type Mutation = Box<dyn FnOnce(&mut LedgerDocument) + Send + 'static>;

struct Envelope {
    mutation: Mutation,
    ack: Option<oneshot::Sender<Result<(), StoreError>>>,
}

/// Serializes all writes to the document store through one worker task.
pub struct DocumentCommitter {
    queue: mpsc::UnboundedSender<Envelope>,
    cancel: watch::Sender<bool>,
    worker: std::sync::Mutex<Option<JoinHandle<Result<(), StoreError>>>>,
}

impl DocumentCommitter {
    /// Create the committer and spawn its worker task.
    pub fn new(store: DocumentStore, events: EventSender) -> Self {
        let (queue, inbox) = mpsc::unbounded_channel();
        let (cancel, cancel_flag) = watch::channel(false);
        let worker = tokio::spawn(drain_queue(store, inbox, cancel_flag, events));

        Self {
            queue,
            cancel,
            worker: std::sync::Mutex::new(Some(worker)),
        }
    }

    /// Enqueue a mutation and return immediately.
    ///
    /// The mutation is applied eventually unless the committer is disposed
    /// first; a mutation pushed after disposal is dropped with a warning.
    pub fn push(&self, mutation: impl FnOnce(&mut LedgerDocument) + Send + 'static) {
        let envelope = Envelope {
            mutation: Box::new(mutation),
            ack: None,
        };
        if self.queue.send(envelope).is_err() {
            warn!("Mutation dropped: document committer is closed");
        }
    }

    /// Enqueue a mutation and wait until it has been applied, validated and
    /// persisted. Used where persistence ordering matters.
    pub async fn execute(
        &self,
        mutation: impl FnOnce(&mut LedgerDocument) + Send + 'static,
    ) -> Result<(), StoreError> {
        let (ack, done) = oneshot::channel();
        let envelope = Envelope {
            mutation: Box::new(mutation),
            ack: Some(ack),
        };
        self.queue
            .send(envelope)
            .map_err(|_| StoreError::CommitterClosed)?;
        done.await.map_err(|_| StoreError::CommitterClosed)?
    }

    /// Request cancellation and wait for the worker to stop.
    ///
    /// The in-flight mutation completes; mutations still queued afterwards
    /// are dropped and their awaiting producers observe a closed committer.
    /// A storage failure that stopped the worker without an observer is
    /// returned here.
    pub async fn dispose(&self) -> Result<(), StoreError> {
        let _ = self.cancel.send(true);

        let worker = self.worker.lock().expect("committer poisoned").take();
        match worker {
            Some(handle) => handle.await.map_err(|_| StoreError::CommitterClosed)?,
            None => Ok(()),
        }
    }
}

async fn drain_queue(
    store: DocumentStore,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
    mut cancel: watch::Receiver<bool>,
    events: EventSender,
) -> Result<(), StoreError> {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            received = inbox.recv() => match received {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let mut applied = 0usize;
        let mut latest: Option<(Arc<LedgerDocument>, DateTime<Utc>)> = None;
        let mut next = Some(envelope);

        while let Some(envelope) = next.take() {
            if *cancel.borrow() {
                if let Some(ack) = envelope.ack {
                    let _ = ack.send(Err(StoreError::CommitterClosed));
                }
                break;
            }

            match apply_one(&store, envelope.mutation).await {
                Ok(outcome) => {
                    if let Some(outcome) = outcome {
                        applied += 1;
                        latest = Some(outcome);
                    }
                    if let Some(ack) = envelope.ack {
                        let _ = ack.send(Ok(()));
                    }
                }
                Err(StoreError::Validation(error)) => {
                    warn!("Mutation rejected by schema validation: {}", error);
                    let _ = events.send(LedgerEvent::MutationRejected {
                        error: error.clone(),
                    });
                    if let Some(ack) = envelope.ack {
                        let _ = ack.send(Err(StoreError::Validation(error)));
                    }
                }
                Err(fatal) => match envelope.ack {
                    // The awaiting producer observes the storage failure and
                    // the worker keeps serving the rest of the queue.
                    Some(ack) => {
                        let _ = ack.send(Err(fatal));
                    }
                    // Nobody is watching this mutation; stop and let
                    // disposal surface the failure.
                    None => {
                        notify_updated(&events, applied, latest);
                        return Err(fatal);
                    }
                },
            }

            next = inbox.try_recv().ok();
        }

        notify_updated(&events, applied, latest);
    }

    debug!("Document committer worker stopped");
    Ok(())
}

fn notify_updated(
    events: &EventSender,
    applied: usize,
    latest: Option<(Arc<LedgerDocument>, DateTime<Utc>)>,
) {
    if applied == 0 {
        return;
    }
    if let Some((document, at)) = latest {
        debug!("Publishing data-updated after {} mutations", applied);
        let _ = events.send(LedgerEvent::DataUpdated { document, at });
    }
}

/// One full mutation cycle under the document lock.
///
/// Returns `None` when the mutation left the document unchanged. On
/// validation failure the offending node is stripped and validation is
/// retried once; whatever legitimately survived the mutation is persisted,
/// the rejected node never is, and the validation error is surfaced either
/// way.
async fn apply_one(
    store: &DocumentStore,
    mutation: Mutation,
) -> Result<Option<(Arc<LedgerDocument>, DateTime<Utc>)>, StoreError> {
    let _guard = store.acquire().await;

    let current = store.load().await?;
    let mut candidate = current.clone();
    mutation(&mut candidate);
    if candidate == current {
        return Ok(None);
    }

    let schema = DocumentSchema::shared();
    if let Err(error) = schema.validate(&candidate) {
        candidate.remove_node(&error.node);
        if schema.validate(&candidate).is_ok() && candidate != current {
            store.persist(&candidate).await?;
        }
        return Err(StoreError::Validation(error));
    }

    store.persist(&candidate).await?;
    Ok(Some((Arc::new(candidate), Utc::now())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::document::{Accounting, BalanceBelowZero, LetterHead};
    use crate::ledger::sync::events;
    use futures::future::join_all;

    fn letter_head(number: i32) -> LetterHead {
        LetterHead {
            number,
            name: format!("Letter head {}", number),
        }
    }

    fn accounting(number: i32) -> Accounting {
        Accounting {
            number,
            name: format!("Accounting {}", number),
            letter_head_number: 1,
            balance_below_zero: BalanceBelowZero::Creditors,
            back_dating_days: 30,
            accounts: Vec::new(),
            budget_accounts: Vec::new(),
            address_accounts: Vec::new(),
            posting_lines: Vec::new(),
        }
    }

    #[tokio::test]
    async fn executed_mutation_is_applied_and_persisted() {
        let store = DocumentStore::in_memory();
        let (events, _) = events::channel(16);
        let committer = DocumentCommitter::new(store.clone(), events);

        committer
            .execute(|doc| doc.upsert_letter_head(letter_head(1)))
            .await
            .unwrap();

        let document = store.get().await.unwrap();
        assert_eq!(document.letter_heads.len(), 1);
        committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_pushes_all_land_without_loss() {
        let store = DocumentStore::in_memory();
        let (events, _) = events::channel(16);
        let committer = Arc::new(DocumentCommitter::new(store.clone(), events));

        let tasks: Vec<_> = (1..=10)
            .map(|number| {
                let committer = Arc::clone(&committer);
                tokio::spawn(async move {
                    committer
                        .execute(move |doc| doc.upsert_letter_head(letter_head(number)))
                        .await
                })
            })
            .collect();
        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let document = store.get().await.unwrap();
        assert_eq!(document.letter_heads.len(), 10);
        committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn rapid_pushes_coalesce_into_one_data_updated_event() {
        let store = DocumentStore::in_memory();
        let (events, mut inbox) = events::channel(16);
        let committer = DocumentCommitter::new(store.clone(), events);

        for number in 1..=5 {
            committer.push(move |doc| doc.upsert_letter_head(letter_head(number)));
        }
        // Flush the queue so the batch has certainly drained.
        committer.execute(|_| {}).await.unwrap();

        match inbox.recv().await.unwrap() {
            LedgerEvent::DataUpdated { document, .. } => {
                assert_eq!(document.letter_heads.len(), 5);
            }
            other => panic!("expected DataUpdated, got {:?}", other),
        }
        assert!(matches!(
            inbox.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
        committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_mutation_is_rejected_without_stopping_the_batch() {
        let store = DocumentStore::in_memory();
        let (events, mut inbox) = events::channel(16);
        let committer = DocumentCommitter::new(store.clone(), events);

        committer.push(|doc| doc.upsert_accounting(accounting(120)));
        committer.push(|doc| doc.upsert_accounting(accounting(1)));
        committer.execute(|_| {}).await.unwrap();

        let document = store.get().await.unwrap();
        assert_eq!(document.accountings.len(), 1);
        assert_eq!(document.accountings[0].number, 1);

        let mut saw_rejection = false;
        let mut saw_update = false;
        while let Ok(event) = inbox.try_recv() {
            match event {
                LedgerEvent::MutationRejected { .. } => saw_rejection = true,
                LedgerEvent::DataUpdated { document, .. } => {
                    saw_update = true;
                    assert!(document.accounting(120).is_none());
                }
                LedgerEvent::Offline => {}
            }
        }
        assert!(saw_rejection);
        assert!(saw_update);
        committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn execute_surfaces_the_validation_error_to_the_producer() {
        let store = DocumentStore::in_memory();
        let (events, _) = events::channel(16);
        let committer = DocumentCommitter::new(store.clone(), events);

        let result = committer
            .execute(|doc| doc.upsert_accounting(accounting(120)))
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        // The worker survived the rejection.
        committer
            .execute(|doc| doc.upsert_letter_head(letter_head(1)))
            .await
            .unwrap();
        committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn dispose_stops_the_worker_and_closes_the_queue() {
        let store = DocumentStore::in_memory();
        let (events, _) = events::channel(16);
        let committer = DocumentCommitter::new(store.clone(), events);

        committer.dispose().await.unwrap();

        let result = committer.execute(|_| {}).await;
        assert!(matches!(result, Err(StoreError::CommitterClosed)));
        // A second disposal is a no-op.
        committer.dispose().await.unwrap();
    }
}
