//! Shared application state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::sse::SsePublisher;
use crate::store::{ProcessStore, RuntimeStore};

/// State shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub processes: Arc<ProcessStore>,
    pub runtimes: Arc<RuntimeStore>,
    pub publisher: Arc<SsePublisher>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        processes: Arc<ProcessStore>,
        runtimes: Arc<RuntimeStore>,
        publisher: Arc<SsePublisher>,
    ) -> Self {
        Self {
            config,
            processes,
            runtimes,
            publisher,
        }
    }
}
