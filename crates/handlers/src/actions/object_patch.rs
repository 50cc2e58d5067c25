//! Remote object patch action.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use stepflow_model::{Opts, Runtime};

use crate::device::{ensure_success, get_object, object_url, DEFAULT_DEVICE_PORT};
use crate::error::HandlerError;
use crate::registry::{parse_opts, ActionHandler};

#[derive(Debug, Deserialize)]
struct PatchOpts {
    service: String,
    object: String,
    #[serde(default)]
    data: Map<String, Value>,
}

/// Merges a partial update into a remote object.
///
/// Reads the object, overlays the patch fields on its `data`, and writes the
/// merged document back. Fields outside `data` are untouched.
pub struct ObjectPatch {
    client: Client,
    port: u16,
}

impl ObjectPatch {
    pub fn new(client: Client) -> Self {
        Self::with_port(client, DEFAULT_DEVICE_PORT)
    }

    /// Port override for deployments not on the default device port.
    pub fn with_port(client: Client, port: u16) -> Self {
        Self { client, port }
    }
}

#[async_trait]
impl ActionHandler for ObjectPatch {
    fn kind(&self) -> &'static str {
        "ObjectPatch"
    }

    fn validate(&self, opts: &Opts) -> bool {
        parse_opts::<PatchOpts>(self.kind(), opts).is_ok()
    }

    async fn run(&self, opts: &Opts, _runtime: &mut Runtime) -> Result<(), HandlerError> {
        let opts: PatchOpts = parse_opts(self.kind(), opts)?;
        let url = object_url(&opts.service, self.port, &opts.object);

        let mut object = get_object(&self.client, &url).await?;
        merge_data(&mut object, &opts.data);
        debug!(url = %url, "writing patched object");

        let response = self.client.put(&url).json(&object).send().await?;
        ensure_success(&url, &response)
    }
}

fn merge_data(object: &mut Value, patch: &Map<String, Value>) {
    match object.get_mut("data") {
        Some(Value::Object(data)) => {
            for (key, value) in patch {
                data.insert(key.clone(), value.clone());
            }
        }
        _ => {
            if let Value::Object(fields) = object {
                fields.insert("data".into(), Value::Object(patch.clone()));
            }
        }
    }
}
