//! Structural document validation.
//!
//! Handler tags and their opts are validated by the handler registry; this
//! module checks only what the documents themselves must satisfy: non-empty
//! ids, unique ids, resolvable step references, and plausible timestamps.

use std::collections::HashSet;

use thiserror::Error;

use crate::process::{Process, Step};
use crate::runtime::Runtime;
use crate::time::plausible_ms;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),
    #[error("duplicate {kind} id '{id}' in step '{step}'")]
    DuplicateItem {
        kind: &'static str,
        id: String,
        step: String,
    },
    #[error("runtime '{0}' has no step results")]
    NoResults(String),
    #[error("result '{result}' references unknown step '{step}'")]
    UnknownStep { result: String, step: String },
    #[error("timestamp {value} on {owner} is not in milliseconds")]
    ImplausibleTimestamp { owner: String, value: i64 },
}

/// Check a process definition.
pub fn validate_process(process: &Process) -> Result<(), ValidationError> {
    if process.id.is_empty() {
        return Err(ValidationError::EmptyField("process id"));
    }
    if process.title.is_empty() {
        return Err(ValidationError::EmptyField("process title"));
    }

    let mut seen = HashSet::new();
    for step in &process.steps {
        if step.id.is_empty() {
            return Err(ValidationError::EmptyField("step id"));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(ValidationError::DuplicateStep(step.id.clone()));
        }
        validate_step(step)?;
    }
    Ok(())
}

fn validate_step(step: &Step) -> Result<(), ValidationError> {
    unique_ids("action", &step.id, step.actions.iter().map(|a| a.id.as_str()))?;
    unique_ids(
        "condition",
        &step.id,
        step.conditions.iter().map(|c| c.id.as_str()),
    )?;
    unique_ids(
        "response",
        &step.id,
        step.responses.iter().map(|r| r.id.as_str()),
    )?;
    Ok(())
}

fn unique_ids<'a>(
    kind: &'static str,
    step: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(ValidationError::EmptyField("item id"));
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateItem {
                kind,
                id: id.to_string(),
                step: step.to_string(),
            });
        }
    }
    Ok(())
}

/// Check a runtime document, embedded process included.
pub fn validate_runtime(runtime: &Runtime) -> Result<(), ValidationError> {
    if runtime.id.is_empty() {
        return Err(ValidationError::EmptyField("runtime id"));
    }
    validate_process(&runtime.process)?;

    if runtime.results.is_empty() {
        return Err(ValidationError::NoResults(runtime.id.clone()));
    }

    check_ts(&format!("runtime '{}' start", runtime.id), runtime.start)?;
    check_ts(&format!("runtime '{}' end", runtime.id), runtime.end)?;

    for result in &runtime.results {
        if runtime.process.find_step(&result.step).is_none() {
            return Err(ValidationError::UnknownStep {
                result: result.id.clone(),
                step: result.step.clone(),
            });
        }
        check_ts(&format!("result '{}' start", result.id), result.start)?;
        check_ts(&format!("result '{}' end", result.id), result.end)?;
    }
    Ok(())
}

fn check_ts(owner: &str, ts: Option<i64>) -> Result<(), ValidationError> {
    match ts {
        Some(value) if !plausible_ms(value) => Err(ValidationError::ImplausibleTimestamp {
            owner: owner.to_string(),
            value,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ActionSpec, ConditionSpec, Opts};
    use crate::runtime::StepResult;

    fn step(id: &str) -> Step {
        Step {
            id: id.into(),
            title: id.to_uppercase(),
            enabled: true,
            actions: vec![],
            conditions: vec![],
            notes: vec![],
            responses: vec![],
        }
    }

    fn process() -> Process {
        Process {
            id: "p1".into(),
            title: "Test".into(),
            steps: vec![step("one"), step("two")],
        }
    }

    fn runtime() -> Runtime {
        let process = process();
        let first = StepResult::pending(&process.steps[0]);
        Runtime {
            id: "r1".into(),
            title: "Test".into(),
            start: Some(1_500_000_000_000),
            end: None,
            process,
            tasks: vec![],
            results: vec![first],
        }
    }

    #[test]
    fn valid_documents_pass() {
        validate_process(&process()).unwrap();
        validate_runtime(&runtime()).unwrap();
    }

    #[test]
    fn empty_process_without_steps_passes() {
        let process = Process {
            id: "p1".into(),
            title: "Empty".into(),
            steps: vec![],
        };
        validate_process(&process).unwrap();
    }

    #[test]
    fn duplicate_step_ids_fail() {
        let mut process = process();
        process.steps.push(step("one"));
        assert!(matches!(
            validate_process(&process),
            Err(ValidationError::DuplicateStep(id)) if id == "one"
        ));
    }

    #[test]
    fn duplicate_action_ids_fail() {
        let mut process = process();
        let action = ActionSpec {
            id: "a1".into(),
            kind: "TaskCreate".into(),
            enabled: true,
            opts: Opts::new(),
        };
        process.steps[0].actions = vec![action.clone(), action];
        assert!(matches!(
            validate_process(&process),
            Err(ValidationError::DuplicateItem { kind: "action", .. })
        ));
    }

    #[test]
    fn duplicate_ids_allowed_across_steps() {
        let mut process = process();
        let condition = ConditionSpec {
            id: "c1".into(),
            kind: "ManualAdvance".into(),
            enabled: true,
            opts: Opts::new(),
        };
        process.steps[0].conditions = vec![condition.clone()];
        process.steps[1].conditions = vec![condition];
        validate_process(&process).unwrap();
    }

    #[test]
    fn runtime_without_results_fails() {
        let mut runtime = runtime();
        runtime.results.clear();
        assert!(matches!(
            validate_runtime(&runtime),
            Err(ValidationError::NoResults(_))
        ));
    }

    #[test]
    fn result_with_unknown_step_fails() {
        let mut runtime = runtime();
        runtime.results[0].step = "missing".into();
        assert!(matches!(
            validate_runtime(&runtime),
            Err(ValidationError::UnknownStep { .. })
        ));
    }

    #[test]
    fn second_resolution_timestamps_fail() {
        let mut runtime = runtime();
        runtime.results[0].start = Some(1_500_000_000);
        assert!(matches!(
            validate_runtime(&runtime),
            Err(ValidationError::ImplausibleTimestamp { value, .. }) if value == 1_500_000_000
        ));
    }
}
