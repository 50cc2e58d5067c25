//! Handler registry and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use stepflow_model::{ActionSpec, ConditionSpec, Opts, Process, ResponseSpec, Runtime, Step};

use crate::actions::{ObjectPatch, TaskCreate, Webhook};
use crate::conditions::{ManualAdvance, ObjectValue, TaskDone, TimeAbsolute, TimeElapsed};
use crate::error::HandlerError;
use crate::responses::Notification;

/// A side effect applied when a step is entered.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The tag this handler is registered under.
    fn kind(&self) -> &'static str;

    /// Whether the raw opts deserialize into this handler's option type.
    fn validate(&self, opts: &Opts) -> bool;

    /// Apply the side effect. May mutate the runtime (tasks etc.).
    async fn run(&self, opts: &Opts, runtime: &mut Runtime) -> Result<(), HandlerError>;
}

/// A predicate gating advancement out of a step.
#[async_trait]
pub trait ConditionHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    fn validate(&self, opts: &Opts) -> bool;

    /// Evaluate the predicate against current state.
    async fn check(&self, opts: &Opts, runtime: &Runtime) -> Result<bool, HandlerError>;
}

/// A display payload evaluated when a runtime is read.
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    fn validate(&self, opts: &Opts) -> bool;

    /// Produce the payload to show.
    async fn respond(&self, opts: &Opts, runtime: &Runtime) -> Result<Value, HandlerError>;
}

/// Deserialize raw opts into a handler's typed options.
pub fn parse_opts<T: DeserializeOwned>(kind: &str, opts: &Opts) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(opts.clone()))
        .map_err(|_| HandlerError::InvalidOpts(kind.to_string()))
}

/// Registry of available handlers, keyed by tag.
pub struct HandlerRegistry {
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    conditions: HashMap<String, Arc<dyn ConditionHandler>>,
    responses: HashMap<String, Arc<dyn ResponseHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            conditions: HashMap::new(),
            responses: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in handler set. Device-object
    /// handlers talk to peer services on `device_port`.
    pub fn with_builtins(device_port: u16) -> Self {
        let client = reqwest::Client::new();
        let mut registry = Self::new();

        registry.register_action(ObjectPatch::with_port(client.clone(), device_port));
        registry.register_action(TaskCreate);
        registry.register_action(Webhook::new(client.clone()));

        registry.register_condition(TimeAbsolute);
        registry.register_condition(TimeElapsed);
        registry.register_condition(ObjectValue::with_port(client, device_port));
        registry.register_condition(ManualAdvance);
        registry.register_condition(TaskDone);

        registry.register_response(Notification);

        registry
    }

    /// Register an action handler.
    pub fn register_action<A: ActionHandler + 'static>(&mut self, handler: A) {
        self.actions.insert(handler.kind().to_string(), Arc::new(handler));
    }

    /// Register a condition handler.
    pub fn register_condition<C: ConditionHandler + 'static>(&mut self, handler: C) {
        self.conditions
            .insert(handler.kind().to_string(), Arc::new(handler));
    }

    /// Register a response handler.
    pub fn register_response<R: ResponseHandler + 'static>(&mut self, handler: R) {
        self.responses
            .insert(handler.kind().to_string(), Arc::new(handler));
    }

    /// List all registered tags, grouped as (actions, conditions, responses).
    pub fn list(&self) -> (Vec<&str>, Vec<&str>, Vec<&str>) {
        (
            self.actions.keys().map(|s| s.as_str()).collect(),
            self.conditions.keys().map(|s| s.as_str()).collect(),
            self.responses.keys().map(|s| s.as_str()).collect(),
        )
    }

    /// Dispatch an action spec to its handler.
    pub async fn run_action(
        &self,
        spec: &ActionSpec,
        runtime: &mut Runtime,
    ) -> Result<(), HandlerError> {
        let handler = self
            .actions
            .get(&spec.kind)
            .ok_or_else(|| HandlerError::UnknownKind(spec.kind.clone()))?;
        handler.run(&spec.opts, runtime).await
    }

    /// Dispatch a condition spec to its handler.
    pub async fn check_condition(
        &self,
        spec: &ConditionSpec,
        runtime: &Runtime,
    ) -> Result<bool, HandlerError> {
        let handler = self
            .conditions
            .get(&spec.kind)
            .ok_or_else(|| HandlerError::UnknownKind(spec.kind.clone()))?;
        handler.check(&spec.opts, runtime).await
    }

    /// Dispatch a response spec to its handler.
    pub async fn evaluate_response(
        &self,
        spec: &ResponseSpec,
        runtime: &Runtime,
    ) -> Result<Value, HandlerError> {
        let handler = self
            .responses
            .get(&spec.kind)
            .ok_or_else(|| HandlerError::UnknownKind(spec.kind.clone()))?;
        handler.respond(&spec.opts, runtime).await
    }

    /// Evaluate every condition of a step, in declared order.
    pub async fn evaluate_conditions(
        &self,
        step: &Step,
        runtime: &Runtime,
    ) -> Result<Vec<bool>, HandlerError> {
        let mut results = Vec::with_capacity(step.conditions.len());
        for condition in &step.conditions {
            results.push(self.check_condition(condition, runtime).await?);
        }
        Ok(results)
    }

    /// Evaluate every enabled response of a step, in declared order.
    pub async fn evaluate_responses(
        &self,
        step: &Step,
        runtime: &Runtime,
    ) -> Result<Vec<Value>, HandlerError> {
        let mut payloads = Vec::new();
        for response in step.responses.iter().filter(|r| r.enabled) {
            payloads.push(self.evaluate_response(response, runtime).await?);
        }
        Ok(payloads)
    }

    /// Save-time check: every tag in the process must be registered and its
    /// opts must pass that handler's validation. Keeps unknown tags out of
    /// stored documents so dispatch never meets one.
    pub fn check_process(&self, process: &Process) -> Result<(), HandlerError> {
        for step in &process.steps {
            for action in &step.actions {
                let problem = match self.actions.get(&action.kind) {
                    None => Some(HandlerError::UnknownKind(action.kind.clone())),
                    Some(handler) if !handler.validate(&action.opts) => {
                        Some(HandlerError::InvalidOpts(action.kind.clone()))
                    }
                    Some(_) => None,
                };
                if let Some(source) = problem {
                    return Err(check_error("action", &action.id, &step.id, source));
                }
            }
            for condition in &step.conditions {
                let problem = match self.conditions.get(&condition.kind) {
                    None => Some(HandlerError::UnknownKind(condition.kind.clone())),
                    Some(handler) if !handler.validate(&condition.opts) => {
                        Some(HandlerError::InvalidOpts(condition.kind.clone()))
                    }
                    Some(_) => None,
                };
                if let Some(source) = problem {
                    return Err(check_error("condition", &condition.id, &step.id, source));
                }
            }
            for response in &step.responses {
                let problem = match self.responses.get(&response.kind) {
                    None => Some(HandlerError::UnknownKind(response.kind.clone())),
                    Some(handler) if !handler.validate(&response.opts) => {
                        Some(HandlerError::InvalidOpts(response.kind.clone()))
                    }
                    Some(_) => None,
                };
                if let Some(source) = problem {
                    return Err(check_error("response", &response.id, &step.id, source));
                }
            }
        }
        Ok(())
    }
}

fn check_error(role: &'static str, id: &str, step: &str, source: HandlerError) -> HandlerError {
    HandlerError::Check {
        role,
        id: id.to_string(),
        step: step.to_string(),
        source: Box::new(source),
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("responses", &self.responses.keys().collect::<Vec<_>>())
            .finish()
    }
}
