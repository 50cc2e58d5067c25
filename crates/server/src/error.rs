//! Error types for the stepflow server.
//!
//! `AppError` implements `IntoResponse` so handlers can return it directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use stepflow_handlers::HandlerError;
use stepflow_model::ValidationError;

use crate::store::DatastoreError;

/// Application-level errors for the server.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing process, runtime, or task
    #[error("not found: {0}")]
    NotFound(String),

    /// Structural or handler-level validation failure
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate resource or terminal-state violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Handler execution failure on the read path
    #[error("handler error: {0}")]
    Handler(String),

    /// Document store failure
    #[error("datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Handler(msg) => {
                tracing::warn!(error = %msg, "handler error");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Datastore(err) => match err {
                DatastoreError::Conflict { .. } => (StatusCode::CONFLICT, self.to_string()),
                DatastoreError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
                _ => {
                    tracing::error!(error = %err, "datastore error");
                    (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
                }
            },
            AppError::Serialization(err) => {
                tracing::error!(error = %err, "serialization error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<HandlerError> for AppError {
    fn from(err: HandlerError) -> Self {
        match &err {
            HandlerError::Check { .. }
            | HandlerError::UnknownKind(_)
            | HandlerError::InvalidOpts(_) => AppError::Validation(err.to_string()),
            _ => AppError::Handler(err.to_string()),
        }
    }
}
