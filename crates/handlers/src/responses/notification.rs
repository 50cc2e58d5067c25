//! Operator notification response.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use stepflow_model::{Opts, Runtime};

use crate::error::HandlerError;
use crate::registry::{parse_opts, ResponseHandler};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct NotifyOpts {
    title: String,
    message: String,
}

/// Echoes its opts as the display payload. The UI renders these as banners
/// on the current step.
pub struct Notification;

#[async_trait]
impl ResponseHandler for Notification {
    fn kind(&self) -> &'static str {
        "Notification"
    }

    fn validate(&self, opts: &Opts) -> bool {
        parse_opts::<NotifyOpts>(self.kind(), opts).is_ok()
    }

    async fn respond(&self, opts: &Opts, _runtime: &Runtime) -> Result<Value, HandlerError> {
        Ok(Value::Object(opts.clone()))
    }
}
