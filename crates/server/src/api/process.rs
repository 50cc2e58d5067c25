//! Process definition endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use stepflow_model::Process;

use crate::error::AppResult;
use crate::store::ProcessStore;

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: String,
}

pub async fn create(
    State(store): State<Arc<ProcessStore>>,
    Json(process): Json<Process>,
) -> AppResult<(StatusCode, Json<Process>)> {
    let process = store.create(process).await?;
    Ok((StatusCode::CREATED, Json(process)))
}

pub async fn list(State(store): State<Arc<ProcessStore>>) -> AppResult<Json<Vec<Process>>> {
    Ok(Json(store.all().await?))
}

pub async fn read(
    State(store): State<Arc<ProcessStore>>,
    Path(id): Path<String>,
) -> AppResult<Json<Process>> {
    Ok(Json(store.read(&id).await?))
}

pub async fn update(
    State(store): State<Arc<ProcessStore>>,
    Path(id): Path<String>,
    Json(process): Json<Process>,
) -> AppResult<Json<Process>> {
    Ok(Json(store.update(&id, process).await?))
}

pub async fn remove(
    State(store): State<Arc<ProcessStore>>,
    Path(id): Path<String>,
) -> AppResult<Json<Removed>> {
    store.remove(&id).await?;
    Ok(Json(Removed { removed: id }))
}
