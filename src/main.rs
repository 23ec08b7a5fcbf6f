use ledger_sync::client::HttpLedgerClient;
use ledger_sync::config::SyncSettings;
use ledger_sync::ledger::DocumentStore;
use ledger_sync::ledger::sync::{self, DocumentCommitter, LedgerEvent, SyncOrchestrator};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::time())
        .init();

    info!("Starting ledger sync service");

    let service_url =
        std::env::var("LEDGER_SYNC_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let data_dir = std::env::var("LEDGER_SYNC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    info!(
        "Remote service: {}, data directory: {:?}",
        service_url, data_dir
    );

    let remote = Arc::new(HttpLedgerClient::new(&service_url));
    let store = DocumentStore::on_disk(data_dir);
    let (events, mut inbox) = sync::events::channel(64);
    let committer = Arc::new(DocumentCommitter::new(store.clone(), events.clone()));

    let event_logger = tokio::spawn(async move {
        while let Ok(event) = inbox.recv().await {
            match event {
                LedgerEvent::DataUpdated { document, at } => {
                    info!(
                        "Ledger data updated at {} ({} accountings)",
                        at,
                        document.accountings.len()
                    );
                }
                LedgerEvent::MutationRejected { error } => {
                    warn!("Mutation rejected: {}", error);
                }
                LedgerEvent::Offline => {
                    warn!("Remote accounting service is unreachable");
                }
            }
        }
    });

    let orchestrator = SyncOrchestrator::new(
        remote,
        store,
        Arc::clone(&committer),
        SyncSettings::default(),
        events,
    );

    match orchestrator.run().await {
        Ok(report) => info!("Sync finished: {}", report.summary()),
        Err(e) => error!("Sync failed: {}", e),
    }

    if let Err(e) = committer.dispose().await {
        error!("Failed to dispose document committer: {}", e);
    }
    event_logger.abort();
}
