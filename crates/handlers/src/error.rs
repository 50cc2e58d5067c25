//! Handler error types.

use thiserror::Error;

/// Errors raised by handler dispatch and execution.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No handler registered under the tag.
    #[error("unknown handler type '{0}'")]
    UnknownKind(String),

    /// The raw opts do not deserialize into the handler's option type.
    #[error("invalid opts for '{0}'")]
    InvalidOpts(String),

    /// Save-time check failure, with the offending item named.
    #[error("{role} '{id}' in step '{step}': {source}")]
    Check {
        role: &'static str,
        id: String,
        step: String,
        #[source]
        source: Box<HandlerError>,
    },

    /// Transport-level HTTP failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    /// Handler-specific failure.
    #[error("{0}")]
    Failed(String),
}
