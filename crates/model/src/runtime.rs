//! Runtime documents.
//!
//! A runtime is one execution of a process. It embeds a value copy of the
//! process taken at creation time and appends one step result per visited
//! step; the last result is always the current step. Edits to the stored
//! process never reach a running runtime.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::process::{Process, Step};

/// One execution of a process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Runtime {
    pub id: String,
    pub title: String,
    /// Millisecond epoch, stamped at creation.
    #[serde(default)]
    pub start: Option<i64>,
    /// Millisecond epoch; a set value makes the runtime terminal.
    #[serde(default)]
    pub end: Option<i64>,
    /// Value copy of the definition at creation time.
    pub process: Process,
    /// Ad-hoc operator tasks, created by actions and watched by conditions.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Append-only step history; never empty.
    pub results: Vec<StepResult>,
}

/// Execution record for one visit of a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub id: String,
    /// Step title at entry time, kept for display after process edits.
    pub title: String,
    /// Step id in the embedded process.
    pub step: String,
    /// Set once the entry actions have run.
    #[serde(default)]
    pub start: Option<i64>,
    /// Set when every condition was satisfied or the step was forced on.
    #[serde(default)]
    pub end: Option<i64>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Operator task; `TaskDone` conditions watch these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub done: bool,
}

/// Diagnostic entry attached to a step result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: i64,
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub source: String,
    pub message: String,
}

impl StepResult {
    /// Fresh, unstarted result for a step.
    pub fn pending(step: &Step) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: step.title.clone(),
            step: step.id.clone(),
            start: None,
            end: None,
            logs: Vec::new(),
        }
    }
}

impl Runtime {
    /// The result being executed. `None` only on documents that failed
    /// validation.
    pub fn current_result(&self) -> Option<&StepResult> {
        self.results.last()
    }

    /// Whether the runtime reached its permanent terminal state.
    pub fn finished(&self) -> bool {
        self.end.is_some()
    }

    /// Position and step of the current result, if the step id resolves.
    pub fn current_step(&self) -> Option<(usize, &Step)> {
        let result = self.results.last()?;
        self.process.find_step(&result.step)
    }
}
