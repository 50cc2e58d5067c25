//! Process definitions.
//!
//! A process is an ordered list of steps. Each step names the actions applied
//! when it is entered, the conditions that gate advancement, optional response
//! probes, and free-form notes for the operator. Handler-specific `opts` stay
//! as raw JSON maps; the handler registry owns their interpretation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw handler options, interpreted by the handler named in `type`.
pub type Opts = Map<String, Value>;

/// An ordered multi-step automation definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Process {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One step of a process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: String,
    pub title: String,
    /// Kept for editors; the engine only honors the per-item flags.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub notes: Vec<Note>,
    /// Informational probes evaluated on read, never by the tick.
    #[serde(default)]
    pub responses: Vec<ResponseSpec>,
}

/// A side effect applied once when its step is entered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub opts: Opts,
}

/// A predicate that must hold before its step is left.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub opts: Opts,
}

/// A display payload evaluated when a runtime is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub opts: Opts,
}

/// Free-form operator documentation attached to a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub title: String,
    pub message: String,
}

fn default_enabled() -> bool {
    true
}

impl Default for Step {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            enabled: true,
            actions: Vec::new(),
            conditions: Vec::new(),
            notes: Vec::new(),
            responses: Vec::new(),
        }
    }
}

impl Process {
    /// Position and step for a step id.
    pub fn find_step(&self, step_id: &str) -> Option<(usize, &Step)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.id == step_id)
    }
}
