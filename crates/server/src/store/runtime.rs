//! Store for runtimes: running (or finished) instances of a process.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use stepflow_handlers::HandlerRegistry;
use stepflow_model::{now_ms, validate_runtime, Process, Runtime, StepResult};
use tokio::sync::MutexGuard;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use super::{Datastore, DatastoreError, DocumentBackend, StoreState};

pub const RUNTIME_DOCUMENT: &str = "runtimes";

/// A runtime decorated with live handler results for its current step.
///
/// `conditions` holds one verdict per declared condition of the current step,
/// `responses` one payload per enabled response. Both are empty once the
/// runtime has ended.
#[derive(Debug, Serialize)]
pub struct RuntimeView {
    #[serde(flatten)]
    pub runtime: Runtime,
    pub conditions: Vec<bool>,
    pub responses: Vec<Value>,
}

/// Runtimes, keyed by runtime id.
///
/// Mutations lock the mirror for the whole read-modify-flush cycle. Reads
/// clone the runtime out of the lock before evaluating handlers, so a slow
/// device never stalls writers.
pub struct RuntimeStore {
    inner: Datastore<Runtime>,
    registry: Arc<HandlerRegistry>,
}

impl RuntimeStore {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        database: &str,
        volatile: bool,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            inner: Datastore::new(backend, database, RUNTIME_DOCUMENT, volatile),
            registry,
        }
    }

    pub async fn startup_read(&self) -> AppResult<()> {
        self.inner.startup_read().await?;
        Ok(())
    }

    pub async fn wait_ready(&self) {
        self.inner.wait_ready().await;
    }

    /// Lock the mirror for a multi-document pass. The scheduler uses this to
    /// tick every runtime under one lock and one flush.
    pub async fn lock_ready(&self) -> Result<MutexGuard<'_, StoreState<Runtime>>, DatastoreError> {
        self.inner.lock_ready().await
    }

    pub async fn flush(&self, state: &mut StoreState<Runtime>) -> Result<(), DatastoreError> {
        self.inner.flush(state).await
    }

    /// Instantiate a process: embed a deep copy of the definition, stamp the
    /// runtime start, and seed a pending result for the first step.
    pub async fn create(&self, process: &Process, title: Option<String>) -> AppResult<Runtime> {
        self.registry.check_process(process)?;
        let first = process.steps.first().ok_or_else(|| {
            AppError::Validation(format!("process '{}' has no steps", process.id))
        })?;

        let runtime = Runtime {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| process.title.clone()),
            start: Some(now_ms()),
            end: None,
            process: process.clone(),
            tasks: Vec::new(),
            results: vec![StepResult::pending(first)],
        };
        validate_runtime(&runtime)?;

        let mut state = self.inner.lock_ready().await?;
        if state.docs.contains_key(&runtime.id) {
            return Err(AppError::Conflict(format!(
                "runtime '{}' already exists",
                runtime.id
            )));
        }
        state.docs.insert(runtime.id.clone(), runtime.clone());
        self.inner.flush(&mut state).await?;
        info!(runtime = %runtime.id, process = %process.id, "runtime created");
        Ok(runtime)
    }

    /// Evaluate the current step's conditions and responses for display.
    /// Handler failures propagate; the caller decides how to surface them.
    async fn view(&self, runtime: Runtime) -> AppResult<RuntimeView> {
        let current = if runtime.finished() {
            None
        } else {
            runtime.current_step().map(|(_, step)| step.clone())
        };
        let Some(step) = current else {
            return Ok(RuntimeView {
                runtime,
                conditions: Vec::new(),
                responses: Vec::new(),
            });
        };

        let conditions = self.registry.evaluate_conditions(&step, &runtime).await?;
        let responses = self.registry.evaluate_responses(&step, &runtime).await?;
        Ok(RuntimeView {
            runtime,
            conditions,
            responses,
        })
    }

    pub async fn read(&self, id: &str) -> AppResult<RuntimeView> {
        let runtime = {
            let state = self.inner.lock_ready().await?;
            state
                .docs
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("runtime '{}'", id)))?
        };
        self.view(runtime).await
    }

    pub async fn all(&self) -> AppResult<Vec<RuntimeView>> {
        let runtimes: Vec<Runtime> = {
            let state = self.inner.lock_ready().await?;
            state.docs.values().cloned().collect()
        };

        let mut views = Vec::with_capacity(runtimes.len());
        for runtime in runtimes {
            views.push(self.view(runtime).await?);
        }
        Ok(views)
    }

    pub async fn remove(&self, id: &str) -> AppResult<()> {
        let mut state = self.inner.lock_ready().await?;
        if state.docs.remove(id).is_none() {
            return Err(AppError::NotFound(format!("runtime '{}'", id)));
        }
        self.inner.flush(&mut state).await?;
        info!(runtime = %id, "runtime removed");
        Ok(())
    }

    /// Force the runtime to a step, bypassing the current step's conditions.
    /// Without an explicit position the next step is targeted. The current
    /// result is closed and a pending result for the target appended.
    pub async fn advance(&self, id: &str, pos: Option<usize>) -> AppResult<Runtime> {
        let mut state = self.inner.lock_ready().await?;
        let runtime = state
            .docs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("runtime '{}'", id)))?;
        if runtime.finished() {
            return Err(AppError::Conflict(format!("runtime '{}' already ended", id)));
        }

        let (current, _) = runtime
            .current_step()
            .ok_or_else(|| AppError::Internal(format!("runtime '{}' has no current step", id)))?;
        let target = pos.unwrap_or(current + 1);
        let step = runtime.process.steps.get(target).ok_or_else(|| {
            AppError::Validation(format!(
                "step position {} out of range for runtime '{}'",
                target, id
            ))
        })?;

        let pending = StepResult::pending(step);
        let step_id = step.id.clone();
        let now = now_ms();
        if let Some(result) = runtime.results.last_mut() {
            if result.end.is_none() {
                result.end = Some(now);
            }
        }
        runtime.results.push(pending);
        let updated = runtime.clone();

        self.inner.flush(&mut state).await?;
        info!(runtime = %id, step = %step_id, "runtime advanced");
        Ok(updated)
    }

    /// End the runtime, closing the current result along with it. Stopping a
    /// runtime that already ended changes nothing and returns the stored
    /// document.
    pub async fn stop(&self, id: &str) -> AppResult<Runtime> {
        let mut state = self.inner.lock_ready().await?;
        let runtime = state
            .docs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("runtime '{}'", id)))?;
        if runtime.end.is_some() {
            return Ok(runtime.clone());
        }

        let now = now_ms();
        if let Some(result) = runtime.results.last_mut() {
            if result.end.is_none() {
                result.end = Some(now);
            }
        }
        runtime.end = Some(now);
        let updated = runtime.clone();
        self.inner.flush(&mut state).await?;
        info!(runtime = %id, "runtime stopped");
        Ok(updated)
    }

    /// Flip the done flag on every task with the given ref.
    pub async fn task_update(&self, id: &str, ref_id: &str, done: bool) -> AppResult<Runtime> {
        let mut state = self.inner.lock_ready().await?;
        let runtime = state
            .docs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("runtime '{}'", id)))?;

        let mut matched = 0;
        for task in runtime.tasks.iter_mut().filter(|task| task.ref_id == ref_id) {
            task.done = done;
            matched += 1;
        }
        if matched == 0 {
            return Err(AppError::NotFound(format!(
                "runtime '{}' has no task '{}'",
                id, ref_id
            )));
        }

        let updated = runtime.clone();
        self.inner.flush(&mut state).await?;
        info!(runtime = %id, task = %ref_id, done, "tasks updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use stepflow_model::{Step, Task};

    fn store() -> RuntimeStore {
        RuntimeStore::new(
            Arc::new(MemoryBackend::default()),
            "stepflow",
            true,
            Arc::new(HandlerRegistry::with_builtins(5000)),
        )
    }

    fn process(steps: usize) -> Process {
        Process {
            id: "p1".to_string(),
            title: "Test process".to_string(),
            steps: (0..steps)
                .map(|n| Step {
                    id: format!("s{}", n + 1),
                    title: format!("Step {}", n + 1),
                    ..Step::default()
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn create_seeds_the_first_step() {
        let store = store();
        store.startup_read().await.unwrap();

        let runtime = store
            .create(&process(2), Some("Tuesday batch".to_string()))
            .await
            .unwrap();

        assert_eq!(runtime.title, "Tuesday batch");
        assert!(runtime.start.is_some());
        assert!(runtime.end.is_none());
        assert_eq!(runtime.results.len(), 1);
        assert_eq!(runtime.results[0].step, "s1");
        assert!(runtime.results[0].start.is_none());
    }

    #[tokio::test]
    async fn create_rejects_empty_processes() {
        let store = store();
        store.startup_read().await.unwrap();

        let err = store.create(&process(0), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn advance_defaults_to_the_next_step() {
        let store = store();
        store.startup_read().await.unwrap();
        let runtime = store.create(&process(3), None).await.unwrap();

        let advanced = store.advance(&runtime.id, None).await.unwrap();
        assert_eq!(advanced.results.len(), 2);
        assert_eq!(advanced.results[1].step, "s2");
        assert!(advanced.results[0].end.is_some());

        // explicit positions may jump anywhere, including backwards
        let jumped = store.advance(&runtime.id, Some(0)).await.unwrap();
        assert_eq!(jumped.results.len(), 3);
        assert_eq!(jumped.results[2].step, "s1");
    }

    #[tokio::test]
    async fn advance_rejects_out_of_range_and_ended() {
        let store = store();
        store.startup_read().await.unwrap();
        let runtime = store.create(&process(2), None).await.unwrap();

        let err = store.advance(&runtime.id, Some(5)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        // the failed advance left the results untouched
        assert_eq!(store.read(&runtime.id).await.unwrap().runtime.results.len(), 1);

        store.stop(&runtime.id).await.unwrap();
        let err = store.advance(&runtime.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = store.advance("missing", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let store = store();
        store.startup_read().await.unwrap();
        let runtime = store.create(&process(1), None).await.unwrap();

        let stopped = store.stop(&runtime.id).await.unwrap();
        let end = stopped.end.unwrap();
        assert_eq!(stopped.results[0].end, Some(end));

        let again = store.stop(&runtime.id).await.unwrap();
        assert_eq!(again.end, Some(end));
    }

    #[tokio::test]
    async fn task_update_flips_every_matching_task() {
        let store = store();
        store.startup_read().await.unwrap();
        let runtime = store.create(&process(1), None).await.unwrap();

        {
            let mut state = store.lock_ready().await.unwrap();
            let stored = state.docs.get_mut(&runtime.id).unwrap();
            for _ in 0..2 {
                stored.tasks.push(Task {
                    ref_id: "chill".to_string(),
                    title: "Chill the wort".to_string(),
                    message: String::new(),
                    done: false,
                });
            }
        }

        let updated = store.task_update(&runtime.id, "chill", true).await.unwrap();
        assert!(updated.tasks.iter().all(|task| task.done));

        let err = store
            .task_update(&runtime.id, "missing", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn read_views_decorate_with_condition_results() {
        let store = store();
        store.startup_read().await.unwrap();

        let mut process = process(1);
        process.steps[0].conditions.push(stepflow_model::ConditionSpec {
            id: "c1".to_string(),
            kind: "ManualAdvance".to_string(),
            enabled: true,
            opts: Default::default(),
        });
        let runtime = store.create(&process, None).await.unwrap();

        let view = store.read(&runtime.id).await.unwrap();
        assert_eq!(view.conditions, vec![false]);
        assert!(view.responses.is_empty());

        // ended runtimes skip evaluation entirely
        store.stop(&runtime.id).await.unwrap();
        let view = store.read(&runtime.id).await.unwrap();
        assert!(view.conditions.is_empty());
    }

    #[tokio::test]
    async fn views_serialize_flattened() {
        let store = store();
        store.startup_read().await.unwrap();
        let runtime = store.create(&process(1), None).await.unwrap();

        let view = store.read(&runtime.id).await.unwrap();
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["id"], runtime.id.as_str());
        assert!(value["conditions"].is_array());
        assert!(value.get("runtime").is_none());
    }
}
