//! In-memory [`DocumentBackend`] for tests and volatile deployments.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{DatastoreError, DocumentBackend};

/// Keeps whole documents in a map, with a counter standing in for the
/// revision string. Same conflict rules as the real thing: a write at a
/// stale revision is rejected.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<(String, String), (u64, Value)>>,
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn read(
        &self,
        database: &str,
        document: &str,
        default: Value,
    ) -> Result<(String, Value), DatastoreError> {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = (database.to_string(), document.to_string());
        let (rev, value) = documents.entry(key).or_insert((1, default));
        Ok((rev.to_string(), value.clone()))
    }

    async fn write(
        &self,
        database: &str,
        document: &str,
        rev: &str,
        value: &Value,
    ) -> Result<String, DatastoreError> {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = (database.to_string(), document.to_string());
        match documents.get_mut(&key) {
            Some((current, stored)) if current.to_string() == rev => {
                *current += 1;
                *stored = value.clone();
                Ok(current.to_string())
            }
            _ => Err(DatastoreError::Conflict {
                document: document.to_string(),
            }),
        }
    }
}
