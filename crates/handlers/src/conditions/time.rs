//! Wall-clock conditions.

use async_trait::async_trait;
use serde::Deserialize;

use stepflow_model::{now_ms, plausible_ms, Opts, Runtime};

use crate::error::HandlerError;
use crate::registry::{parse_opts, ConditionHandler};

#[derive(Debug, Deserialize)]
struct AbsoluteOpts {
    /// Millisecond epoch.
    time: i64,
}

/// Satisfied once the wall clock has passed a fixed point in time.
pub struct TimeAbsolute;

#[async_trait]
impl ConditionHandler for TimeAbsolute {
    fn kind(&self) -> &'static str {
        "TimeAbsolute"
    }

    fn validate(&self, opts: &Opts) -> bool {
        match parse_opts::<AbsoluteOpts>(self.kind(), opts) {
            Ok(opts) => plausible_ms(opts.time),
            Err(_) => false,
        }
    }

    async fn check(&self, opts: &Opts, _runtime: &Runtime) -> Result<bool, HandlerError> {
        let opts: AbsoluteOpts = parse_opts(self.kind(), opts)?;
        Ok(now_ms() > opts.time)
    }
}

#[derive(Debug, Deserialize)]
struct ElapsedOpts {
    /// Milliseconds since the current step result started.
    duration: i64,
}

/// Satisfied once the current step has been running longer than `duration`.
/// Unsatisfied while the step's entry actions have not stamped `start` yet.
pub struct TimeElapsed;

#[async_trait]
impl ConditionHandler for TimeElapsed {
    fn kind(&self) -> &'static str {
        "TimeElapsed"
    }

    fn validate(&self, opts: &Opts) -> bool {
        match parse_opts::<ElapsedOpts>(self.kind(), opts) {
            Ok(opts) => opts.duration >= 0,
            Err(_) => false,
        }
    }

    async fn check(&self, opts: &Opts, runtime: &Runtime) -> Result<bool, HandlerError> {
        let opts: ElapsedOpts = parse_opts(self.kind(), opts)?;
        match runtime.current_result().and_then(|result| result.start) {
            Some(start) => Ok(now_ms() - start > opts.duration),
            None => Ok(false),
        }
    }
}
