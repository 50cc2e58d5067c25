//! Operator-gated advancement.

use async_trait::async_trait;

use stepflow_model::{Opts, Runtime};

use crate::error::HandlerError;
use crate::registry::ConditionHandler;

/// Never satisfied. Holds the step until an operator forces it on with the
/// admin advance operation.
pub struct ManualAdvance;

#[async_trait]
impl ConditionHandler for ManualAdvance {
    fn kind(&self) -> &'static str {
        "ManualAdvance"
    }

    fn validate(&self, _opts: &Opts) -> bool {
        true
    }

    async fn check(&self, _opts: &Opts, _runtime: &Runtime) -> Result<bool, HandlerError> {
        Ok(false)
    }
}
