//! Task completion condition.

use async_trait::async_trait;
use serde::Deserialize;

use stepflow_model::{Opts, Runtime};

use crate::error::HandlerError;
use crate::registry::{parse_opts, ConditionHandler};

#[derive(Debug, Deserialize)]
struct DoneOpts {
    #[serde(rename = "ref")]
    ref_id: String,
}

/// Satisfied when at least one task with the ref exists and every task with
/// that ref is done. A ref no action has created yet does not satisfy.
pub struct TaskDone;

#[async_trait]
impl ConditionHandler for TaskDone {
    fn kind(&self) -> &'static str {
        "TaskDone"
    }

    fn validate(&self, opts: &Opts) -> bool {
        parse_opts::<DoneOpts>(self.kind(), opts).is_ok()
    }

    async fn check(&self, opts: &Opts, runtime: &Runtime) -> Result<bool, HandlerError> {
        let opts: DoneOpts = parse_opts(self.kind(), opts)?;
        let mut matching = runtime
            .tasks
            .iter()
            .filter(|task| task.ref_id == opts.ref_id)
            .peekable();

        Ok(matching.peek().is_some() && matching.all(|task| task.done))
    }
}
