//! Ad-hoc operator task creation.

use async_trait::async_trait;
use serde::Deserialize;

use stepflow_model::{Opts, Runtime, Task};

use crate::error::HandlerError;
use crate::registry::{parse_opts, ActionHandler};

#[derive(Debug, Deserialize)]
struct CreateOpts {
    #[serde(rename = "ref")]
    ref_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
}

/// Appends a pending task to the runtime. A later `TaskDone` condition on the
/// same ref holds its step until an operator marks the task done.
pub struct TaskCreate;

#[async_trait]
impl ActionHandler for TaskCreate {
    fn kind(&self) -> &'static str {
        "TaskCreate"
    }

    fn validate(&self, opts: &Opts) -> bool {
        parse_opts::<CreateOpts>(self.kind(), opts).is_ok()
    }

    async fn run(&self, opts: &Opts, runtime: &mut Runtime) -> Result<(), HandlerError> {
        let opts: CreateOpts = parse_opts(self.kind(), opts)?;
        runtime.tasks.push(Task {
            ref_id: opts.ref_id,
            title: opts.title,
            message: opts.message,
            done: false,
        });
        Ok(())
    }
}
