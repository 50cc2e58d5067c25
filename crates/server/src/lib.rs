//! Step execution server.
//!
//! Serves process definitions and runtimes over HTTP, advances active
//! runtimes on a fixed tick, and streams runtime snapshots to subscribers
//! over SSE. Documents live in CouchDB behind an in-memory mirror.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod sse;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;
