//! Whole-document persistence behind the stores.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::DatastoreError;

/// Reads and writes one named document at a time.
///
/// `read` must create the document from `default` when it does not exist yet,
/// so a fresh database and a populated one look the same to the store.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn read(
        &self,
        database: &str,
        document: &str,
        default: Value,
    ) -> Result<(String, Value), DatastoreError>;

    async fn write(
        &self,
        database: &str,
        document: &str,
        rev: &str,
        value: &Value,
    ) -> Result<String, DatastoreError>;
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    rev: String,
}

/// CouchDB-backed document storage.
#[derive(Debug, Clone)]
pub struct CouchBackend {
    client: Client,
    base_url: String,
}

impl CouchBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn document_url(&self, database: &str, document: &str) -> String {
        format!("{}/{}/{}", self.base_url, database, document)
    }

    /// Create the database if it does not exist. CouchDB answers 412 when it
    /// already does, which is just as good.
    async fn ensure_database(&self, database: &str) -> Result<(), DatastoreError> {
        let url = format!("{}/{}", self.base_url, database);
        let response = self.client.put(&url).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
            debug!(database, "database present");
            Ok(())
        } else {
            Err(DatastoreError::Payload(format!(
                "creating database '{}' returned {}",
                database, status
            )))
        }
    }
}

#[async_trait]
impl DocumentBackend for CouchBackend {
    async fn read(
        &self,
        database: &str,
        document: &str,
        default: Value,
    ) -> Result<(String, Value), DatastoreError> {
        self.ensure_database(database).await?;

        let url = self.document_url(database, document);
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                let created = self.client.put(&url).json(&default).send().await?;
                if !created.status().is_success() {
                    return Err(DatastoreError::Payload(format!(
                        "creating document '{}' returned {}",
                        document,
                        created.status()
                    )));
                }
                let body: WriteResponse = created.json().await?;
                info!(document, "created empty document");
                Ok((body.rev, default))
            }
            status if status.is_success() => {
                let mut body: Value = response.json().await?;
                let rev = body
                    .get("_rev")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        DatastoreError::Payload(format!("document '{}' has no _rev", document))
                    })?;
                if let Some(fields) = body.as_object_mut() {
                    fields.remove("_id");
                    fields.remove("_rev");
                }
                Ok((rev, body))
            }
            status => Err(DatastoreError::Payload(format!(
                "reading document '{}' returned {}",
                document, status
            ))),
        }
    }

    async fn write(
        &self,
        database: &str,
        document: &str,
        rev: &str,
        value: &Value,
    ) -> Result<String, DatastoreError> {
        let url = format!("{}?rev={}", self.document_url(database, document), rev);
        let response = self.client.put(&url).json(value).send().await?;
        match response.status() {
            StatusCode::CONFLICT => Err(DatastoreError::Conflict {
                document: document.to_string(),
            }),
            status if status.is_success() => {
                let body: WriteResponse = response.json().await?;
                Ok(body.rev)
            }
            status => Err(DatastoreError::Payload(format!(
                "writing document '{}' returned {}",
                document, status
            ))),
        }
    }
}
