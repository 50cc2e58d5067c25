//! Runtime endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stepflow_model::Runtime;

use crate::error::AppResult;
use crate::state::AppState;
use crate::store::RuntimeView;

#[derive(Debug, Deserialize)]
pub struct CreateRuntimeRequest {
    /// Id of the process to instantiate.
    pub process: String,
    /// Runtime title; the process title when omitted.
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    /// Target step position; the next step when omitted.
    #[serde(default)]
    pub pos: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TaskUpdateRequest {
    pub done: bool,
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateRuntimeRequest>,
) -> AppResult<(StatusCode, Json<Runtime>)> {
    let process = state.processes.read(&request.process).await?;
    let runtime = state.runtimes.create(&process, request.title).await?;
    Ok((StatusCode::CREATED, Json(runtime)))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<RuntimeView>>> {
    Ok(Json(state.runtimes.all().await?))
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<RuntimeView>> {
    Ok(Json(state.runtimes.read(&id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Removed>> {
    state.runtimes.remove(&id).await?;
    Ok(Json(Removed { removed: id }))
}

pub async fn advance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AdvanceRequest>,
) -> AppResult<Json<Runtime>> {
    Ok(Json(state.runtimes.advance(&id, request.pos).await?))
}

pub async fn stop(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Runtime>> {
    Ok(Json(state.runtimes.stop(&id).await?))
}

pub async fn task_update(
    State(state): State<AppState>,
    Path((id, ref_id)): Path<(String, String)>,
    Json(request): Json<TaskUpdateRequest>,
) -> AppResult<Json<Runtime>> {
    Ok(Json(
        state.runtimes.task_update(&id, &ref_id, request.done).await?,
    ))
}
