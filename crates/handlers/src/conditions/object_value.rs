//! Remote object value comparison.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stepflow_model::{Opts, Runtime};

use crate::device::{get_object, object_url, DEFAULT_DEVICE_PORT};
use crate::error::HandlerError;
use crate::registry::{parse_opts, ConditionHandler};

/// Comparison operator for [`ObjectValue`] opts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compare {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

#[derive(Debug, Deserialize)]
struct ValueOpts {
    service: String,
    object: String,
    key: String,
    operator: Compare,
    value: Value,
}

/// Satisfied when a field of a remote object compares true against a literal.
///
/// Numbers compare as f64, strings lexicographically, bools only by
/// `eq`/`ne`. A missing key or mismatched types never satisfy.
pub struct ObjectValue {
    client: Client,
    port: u16,
}

impl ObjectValue {
    pub fn new(client: Client) -> Self {
        Self::with_port(client, DEFAULT_DEVICE_PORT)
    }

    /// Port override for deployments not on the default device port.
    pub fn with_port(client: Client, port: u16) -> Self {
        Self { client, port }
    }
}

#[async_trait]
impl ConditionHandler for ObjectValue {
    fn kind(&self) -> &'static str {
        "ObjectValue"
    }

    fn validate(&self, opts: &Opts) -> bool {
        parse_opts::<ValueOpts>(self.kind(), opts).is_ok()
    }

    async fn check(&self, opts: &Opts, _runtime: &Runtime) -> Result<bool, HandlerError> {
        let opts: ValueOpts = parse_opts(self.kind(), opts)?;
        let url = object_url(&opts.service, self.port, &opts.object);

        let object = get_object(&self.client, &url).await?;
        let actual = object.get("data").and_then(|data| data.get(&opts.key));
        match actual {
            Some(actual) => Ok(compare(actual, opts.operator, &opts.value)),
            None => Ok(false),
        }
    }
}

fn compare(actual: &Value, op: Compare, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => compare_ord(a.partial_cmp(&b), op),
            _ => false,
        },
        (Value::String(a), Value::String(b)) => compare_ord(Some(a.cmp(b)), op),
        (Value::Bool(a), Value::Bool(b)) => match op {
            Compare::Eq => a == b,
            Compare::Ne => a != b,
            _ => false,
        },
        // mismatched types never satisfy
        _ => false,
    }
}

fn compare_ord(ordering: Option<std::cmp::Ordering>, op: Compare) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Compare::Lt => ordering.is_lt(),
        Compare::Le => ordering.is_le(),
        Compare::Eq => ordering.is_eq(),
        Compare::Ne => ordering.is_ne(),
        Compare::Ge => ordering.is_ge(),
        Compare::Gt => ordering.is_gt(),
    }
}
