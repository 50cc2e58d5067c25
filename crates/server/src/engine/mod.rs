//! The step advancement engine.
//!
//! Each tick walks a runtime through at most one transition: enter the
//! current step if it has not been entered yet (applying its actions), then
//! evaluate its conditions and, when all hold, close the step and open the
//! next one. A runtime on its last step ends instead.

use stepflow_handlers::HandlerRegistry;
use stepflow_model::{now_ms, ActionSpec, LogEntry, Runtime, StepResult};
use tracing::{info, warn};

use crate::error::AppResult;
use crate::store::RuntimeStore;

pub mod scheduler;

pub use scheduler::Scheduler;

/// Advance a single runtime by one tick. Returns whether the document
/// changed and needs a flush.
///
/// Action failures are caught per action: the failure lands in the step
/// result's log and the remaining actions still run. A condition failure
/// halts the tick without touching the document; the next tick retries.
pub async fn update(registry: &HandlerRegistry, runtime: &mut Runtime) -> bool {
    if runtime.finished() {
        return false;
    }
    let (pos, step) = match runtime.current_step() {
        Some((pos, step)) => (pos, step.clone()),
        None => {
            warn!(runtime = %runtime.id, "current step not in process");
            return false;
        }
    };

    let mut changed = false;

    let entering = runtime
        .results
        .last()
        .map_or(true, |result| result.start.is_none());
    if entering {
        changed = true;
        for action in step.actions.iter().filter(|action| action.enabled) {
            if let Err(err) = registry.run_action(action, runtime).await {
                warn!(
                    runtime = %runtime.id,
                    step = %step.id,
                    action = %action.id,
                    error = %err,
                    "action failed"
                );
                log_failure(runtime, action, &err.to_string());
            }
        }
        if let Some(result) = runtime.results.last_mut() {
            result.start = Some(now_ms());
        }
        info!(runtime = %runtime.id, step = %step.id, "step entered");
    }

    let mut satisfied = true;
    for condition in step.conditions.iter().filter(|condition| condition.enabled) {
        match registry.check_condition(condition, runtime).await {
            Ok(true) => {}
            Ok(false) => {
                satisfied = false;
                break;
            }
            Err(err) => {
                warn!(
                    runtime = %runtime.id,
                    step = %step.id,
                    condition = %condition.id,
                    error = %err,
                    "condition check failed"
                );
                satisfied = false;
                break;
            }
        }
    }
    if !satisfied {
        return changed;
    }

    changed = true;
    let now = now_ms();
    let next = runtime.process.steps.get(pos + 1).cloned();
    if let Some(result) = runtime.results.last_mut() {
        result.end = Some(now);
    }
    match next {
        Some(next) => {
            info!(runtime = %runtime.id, step = %step.id, next = %next.id, "step complete");
            runtime.results.push(StepResult::pending(&next));
        }
        None => {
            runtime.end = Some(now);
            info!(runtime = %runtime.id, "process complete");
        }
    }
    changed
}

fn log_failure(runtime: &mut Runtime, action: &ActionSpec, message: &str) {
    if let Some(result) = runtime.results.last_mut() {
        result.logs.push(LogEntry {
            timestamp: now_ms(),
            ref_id: action.id.clone(),
            source: action.kind.clone(),
            message: message.to_string(),
        });
    }
}

/// Tick every runtime under one lock, flushing once if anything changed.
pub async fn tick_all(store: &RuntimeStore, registry: &HandlerRegistry) -> AppResult<bool> {
    let mut state = store.lock_ready().await?;
    let mut changed = false;
    for runtime in state.docs.values_mut() {
        changed |= update(registry, runtime).await;
    }
    if changed {
        store.flush(&mut state).await?;
    }
    Ok(changed)
}
