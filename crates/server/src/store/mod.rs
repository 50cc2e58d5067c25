//! Revisioned document store with an in-memory mirror.
//!
//! Each concrete store keeps one named document (a map of id to entry) in the
//! backing database and mirrors it in memory behind a single mutex. All reads
//! and writes go through the mirror; the backend only sees whole-document
//! reads at startup and whole-document writes on change, guarded by the
//! document revision.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::info;

pub mod backend;
pub mod memory;
pub mod process;
pub mod runtime;

pub use backend::{CouchBackend, DocumentBackend};
pub use memory::MemoryBackend;
pub use process::ProcessStore;
pub use runtime::{RuntimeStore, RuntimeView};

/// How long callers wait for the startup read before giving up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(20);

/// Document store failures.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// Transport-level failure talking to the backend.
    #[error("datastore request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The document moved to a new revision behind our back.
    #[error("document '{document}' was modified concurrently")]
    Conflict { document: String },

    /// A write was attempted before the startup read established a revision.
    #[error("cannot write '{document}' before the startup read")]
    RevisionUnknown { document: String },

    /// The startup read has not completed within [`READY_TIMEOUT`].
    #[error("timed out waiting for the store to become ready")]
    NotReady,

    /// The backend answered with something other than a document.
    #[error("unexpected datastore response: {0}")]
    Payload(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Mirror of one stored document: collection entries plus their revision.
#[derive(Debug)]
pub struct StoreState<T> {
    pub rev: Option<String>,
    pub docs: BTreeMap<String, T>,
}

/// One named document in the backing database, mirrored in memory.
pub struct Datastore<T> {
    database: String,
    document: String,
    volatile: bool,
    backend: Arc<dyn DocumentBackend>,
    state: Mutex<StoreState<T>>,
    ready_tx: watch::Sender<bool>,
}

impl<T> Datastore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        database: &str,
        document: &str,
        volatile: bool,
    ) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            database: database.to_string(),
            document: document.to_string(),
            volatile,
            backend,
            state: Mutex::new(StoreState {
                rev: None,
                docs: BTreeMap::new(),
            }),
            ready_tx,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// One-time startup read: populate the mirror from the backend, creating
    /// the document when absent, then signal readiness. In volatile mode the
    /// backend is skipped and the store is ready immediately.
    pub async fn startup_read(&self) -> Result<(), DatastoreError> {
        if self.volatile {
            info!(document = %self.document, "volatile store ready");
            self.ready_tx.send_replace(true);
            return Ok(());
        }

        let empty = Value::Object(serde_json::Map::new());
        let (rev, value) = self
            .backend
            .read(&self.database, &self.document, empty)
            .await?;
        let docs: BTreeMap<String, T> = serde_json::from_value(value)?;

        {
            let mut state = self.state.lock().await;
            state.rev = Some(rev);
            state.docs = docs;
            info!(document = %self.document, entries = state.docs.len(), "store read");
        }
        self.ready_tx.send_replace(true);
        Ok(())
    }

    /// Wait for readiness without a deadline. Used by the background loops,
    /// which have nothing better to do until the startup read lands.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready_tx.subscribe();
        let _ = ready.wait_for(|ready| *ready).await;
    }

    /// Await readiness (bounded by [`READY_TIMEOUT`]), then lock the mirror.
    pub async fn lock_ready(&self) -> Result<MutexGuard<'_, StoreState<T>>, DatastoreError> {
        let mut ready = self.ready_tx.subscribe();
        match tokio::time::timeout(READY_TIMEOUT, ready.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => return Err(DatastoreError::NotReady),
        }
        Ok(self.state.lock().await)
    }

    /// Push the mirror to the backend at the held revision and store the new
    /// one. The caller keeps the lock for the whole read-modify-flush cycle.
    pub async fn flush(&self, state: &mut StoreState<T>) -> Result<(), DatastoreError> {
        if self.volatile {
            return Ok(());
        }

        let rev = state
            .rev
            .clone()
            .ok_or_else(|| DatastoreError::RevisionUnknown {
                document: self.document.clone(),
            })?;
        let value = serde_json::to_value(&state.docs)?;
        let new_rev = self
            .backend
            .write(&self.database, &self.document, &rev, &value)
            .await?;
        state.rev = Some(new_rev);
        Ok(())
    }
}
