//! HTTP surface.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::sse::{self, SsePublisher};
use crate::state::AppState;
use crate::store::ProcessStore;

pub mod health;
pub mod process;
pub mod runtime;

fn process_routes(store: Arc<ProcessStore>) -> Router {
    Router::new()
        .route("/api/processes", post(process::create).get(process::list))
        .route(
            "/api/processes/{id}",
            get(process::read).put(process::update).delete(process::remove),
        )
        .with_state(store)
}

fn runtime_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/runtimes", post(runtime::create).get(runtime::list))
        .route(
            "/api/runtimes/{id}",
            get(runtime::read).delete(runtime::remove),
        )
        .route("/api/runtimes/{id}/advance", post(runtime::advance))
        .route("/api/runtimes/{id}/stop", post(runtime::stop))
        .route("/api/runtimes/{id}/tasks/{ref}", post(runtime::task_update))
        .with_state(state)
}

fn sse_routes(publisher: Arc<SsePublisher>) -> Router {
    Router::new()
        .route("/api/sse/runtimes", get(sse::feed))
        .with_state(publisher)
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(process_routes(state.processes.clone()))
        .merge(runtime_routes(state.clone()))
        .merge(sse_routes(state.publisher.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
