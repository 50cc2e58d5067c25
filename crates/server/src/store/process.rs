//! Store for process definitions.

use std::sync::Arc;

use stepflow_handlers::HandlerRegistry;
use stepflow_model::{validate_process, Process};
use tracing::info;

use crate::error::{AppError, AppResult};
use super::{Datastore, DocumentBackend};

pub const PROCESS_DOCUMENT: &str = "processes";

/// Process definitions, keyed by process id.
///
/// Every write revalidates the stored definition: structure through
/// `validate_process`, handler tags and opts through the registry. Invalid
/// definitions never reach the datastore.
pub struct ProcessStore {
    inner: Datastore<Process>,
    registry: Arc<HandlerRegistry>,
}

impl ProcessStore {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        database: &str,
        volatile: bool,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            inner: Datastore::new(backend, database, PROCESS_DOCUMENT, volatile),
            registry,
        }
    }

    pub async fn startup_read(&self) -> AppResult<()> {
        self.inner.startup_read().await?;
        Ok(())
    }

    fn check(&self, process: &Process) -> AppResult<()> {
        validate_process(process)?;
        self.registry.check_process(process)?;
        Ok(())
    }

    pub async fn create(&self, process: Process) -> AppResult<Process> {
        self.check(&process)?;

        let mut state = self.inner.lock_ready().await?;
        if state.docs.contains_key(&process.id) {
            return Err(AppError::Conflict(format!(
                "process '{}' already exists",
                process.id
            )));
        }
        state.docs.insert(process.id.clone(), process.clone());
        self.inner.flush(&mut state).await?;
        info!(process = %process.id, "process created");
        Ok(process)
    }

    pub async fn all(&self) -> AppResult<Vec<Process>> {
        let state = self.inner.lock_ready().await?;
        Ok(state.docs.values().cloned().collect())
    }

    pub async fn read(&self, id: &str) -> AppResult<Process> {
        let state = self.inner.lock_ready().await?;
        state
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("process '{}'", id)))
    }

    pub async fn update(&self, id: &str, process: Process) -> AppResult<Process> {
        if process.id != id {
            return Err(AppError::Validation(format!(
                "process id '{}' does not match path '{}'",
                process.id, id
            )));
        }
        self.check(&process)?;

        let mut state = self.inner.lock_ready().await?;
        if !state.docs.contains_key(id) {
            return Err(AppError::NotFound(format!("process '{}'", id)));
        }
        state.docs.insert(id.to_string(), process.clone());
        self.inner.flush(&mut state).await?;
        info!(process = %id, "process updated");
        Ok(process)
    }

    pub async fn remove(&self, id: &str) -> AppResult<()> {
        let mut state = self.inner.lock_ready().await?;
        if state.docs.remove(id).is_none() {
            return Err(AppError::NotFound(format!("process '{}'", id)));
        }
        self.inner.flush(&mut state).await?;
        info!(process = %id, "process removed");
        Ok(())
    }
}
