//! Outbound webhook action.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use stepflow_model::{Opts, Runtime};

use crate::device::ensure_success;
use crate::error::HandlerError;
use crate::registry::{parse_opts, ActionHandler};

#[derive(Debug, Deserialize)]
struct WebhookOpts {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// Fires an HTTP request at an arbitrary endpoint when the step is entered.
pub struct Webhook {
    client: Client,
}

impl Webhook {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for Webhook {
    fn kind(&self) -> &'static str {
        "Webhook"
    }

    fn validate(&self, opts: &Opts) -> bool {
        match parse_opts::<WebhookOpts>(self.kind(), opts) {
            Ok(opts) => opts.method.parse::<Method>().is_ok(),
            Err(_) => false,
        }
    }

    async fn run(&self, opts: &Opts, _runtime: &mut Runtime) -> Result<(), HandlerError> {
        let opts: WebhookOpts = parse_opts(self.kind(), opts)?;
        let method = opts
            .method
            .parse::<Method>()
            .map_err(|_| HandlerError::Failed(format!("invalid method '{}'", opts.method)))?;

        debug!(method = %method, url = %opts.url, "firing webhook");
        let mut request = self.client.request(method, &opts.url);
        for (name, value) in &opts.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &opts.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        ensure_success(&opts.url, &response)
    }
}
