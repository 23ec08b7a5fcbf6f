//! Local document store.
//!
//! Owns the single on-disk ledger document. The document is loaded and saved
//! atomically as a whole; absence of the file is a valid start state and
//! yields a fresh, schema-valid skeleton. All access shares one coarse lock
//! spanning the full load→mutate→validate→persist cycle, so no reader ever
//! observes a document mid-mutation.

use crate::ledger::document::LedgerDocument;
use crate::ledger::schema::ValidationError;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Failures raised by the document store and the mutation committer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("document encoding failure: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("document committer is closed")]
    CommitterClosed,
}

/// Repository for ledger document persistence.
#[async_trait::async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Load the persisted document, or `None` when none has been saved yet.
    async fn load(&self) -> Result<Option<LedgerDocument>, StoreError>;
    /// Persist the document as one unit.
    async fn save(&self, document: &LedgerDocument) -> Result<(), StoreError>;
}

/// File-based implementation of [`DocumentRepository`].
///
/// Keeps one JSON document plus a small metadata file with the last-updated
/// timestamp. Saves go through a temporary file and a rename so the document
/// is never partially written.
pub struct FileDocumentRepository {
    data_dir: PathBuf,
}

impl FileDocumentRepository {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn document_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    fn staging_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json.tmp")
    }

    fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("ledger.meta.json")
    }
}

#[async_trait::async_trait]
impl DocumentRepository for FileDocumentRepository {
    async fn load(&self) -> Result<Option<LedgerDocument>, StoreError> {
        let path = self.document_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let document: LedgerDocument = serde_json::from_str(&content)?;
        debug!("Loaded ledger document from {:?}", path);
        Ok(Some(document))
    }

    async fn save(&self, document: &LedgerDocument) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let content = serde_json::to_string_pretty(document)?;
        let staging = self.staging_path();
        let path = self.document_path();
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &path).await?;

        let metadata = serde_json::json!({
            "lastUpdated": Utc::now().to_rfc3339(),
        });
        tokio::fs::write(
            self.metadata_path(),
            serde_json::to_string_pretty(&metadata)?,
        )
        .await?;

        info!("Saved ledger document to {:?}", path);
        Ok(())
    }
}

/// In-memory implementation of [`DocumentRepository`] for tests and embedders.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    document: std::sync::Mutex<Option<LedgerDocument>>,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-seeded document instead of an absent one.
    pub fn seeded(document: LedgerDocument) -> Self {
        Self {
            document: std::sync::Mutex::new(Some(document)),
        }
    }
}

#[async_trait::async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn load(&self) -> Result<Option<LedgerDocument>, StoreError> {
        Ok(self.document.lock().expect("repository poisoned").clone())
    }

    async fn save(&self, document: &LedgerDocument) -> Result<(), StoreError> {
        *self.document.lock().expect("repository poisoned") = Some(document.clone());
        Ok(())
    }
}

/// Mutually-exclusive accessor over the persisted ledger document.
#[derive(Clone)]
pub struct DocumentStore {
    repository: Arc<dyn DocumentRepository>,
    lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(repository: Arc<dyn DocumentRepository>) -> Self {
        Self {
            repository,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn on_disk(data_dir: PathBuf) -> Self {
        Self::new(Arc::new(FileDocumentRepository::new(data_dir)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentRepository::new()))
    }

    /// Acquire the document lock for a full load→mutate→validate→persist
    /// cycle. The mutation committer holds this guard for every write.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Current document under the lock. Returns an empty skeleton when
    /// nothing has been persisted yet.
    pub async fn get(&self) -> Result<LedgerDocument, StoreError> {
        let _guard = self.acquire().await;
        self.load().await
    }

    /// Load without taking the lock. The caller must hold the guard from
    /// [`DocumentStore::acquire`].
    pub(crate) async fn load(&self) -> Result<LedgerDocument, StoreError> {
        Ok(self
            .repository
            .load()
            .await?
            .unwrap_or_else(LedgerDocument::empty))
    }

    /// Persist without taking the lock. The caller must hold the guard from
    /// [`DocumentStore::acquire`].
    pub(crate) async fn persist(&self, document: &LedgerDocument) -> Result<(), StoreError> {
        self.repository.save(document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::document::LetterHead;

    #[tokio::test]
    async fn absent_file_loads_as_empty_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::on_disk(dir.path().to_path_buf());

        let document = store.get().await.unwrap();
        assert!(document.is_empty());
    }

    #[tokio::test]
    async fn document_round_trips_through_the_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDocumentRepository::new(dir.path().to_path_buf());

        assert!(repository.load().await.unwrap().is_none());

        let mut document = LedgerDocument::empty();
        document.upsert_letter_head(LetterHead {
            number: 1,
            name: "Me".to_string(),
        });
        repository.save(&document).await.unwrap();

        let loaded = repository.load().await.unwrap().unwrap();
        assert_eq!(loaded, document);

        assert!(dir.path().join("ledger.meta.json").exists());
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[tokio::test]
    async fn save_replaces_the_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDocumentRepository::new(dir.path().to_path_buf());

        let mut first = LedgerDocument::empty();
        first.upsert_letter_head(LetterHead {
            number: 1,
            name: "Me".to_string(),
        });
        repository.save(&first).await.unwrap();

        let second = LedgerDocument::empty();
        repository.save(&second).await.unwrap();

        let loaded = repository.load().await.unwrap().unwrap();
        assert!(loaded.letter_heads.is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("ledger.json"), "not json")
            .await
            .unwrap();

        let repository = FileDocumentRepository::new(dir.path().to_path_buf());
        match repository.load().await {
            Err(StoreError::Encode(_)) => {}
            other => panic!("expected encoding error, got {:?}", other.map(|_| ())),
        }
    }
}
