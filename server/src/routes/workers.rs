use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use capacity_types::{Worker, sorted_machine_types};
use serde::Deserialize;

use capacity_common::response;

use crate::app::App;

pub async fn list_machine_types(State(state): State<App>) -> impl IntoResponse {
    match state.engine.machine_types().await {
        Ok(types) => (StatusCode::OK, Json(sorted_machine_types(types))).into_response(),
        Err(e) => response::internal_server_error(e),
    }
}

#[derive(Deserialize)]
pub struct CreateWorkerRequest {
    pub machine_type: String,
}

pub async fn create_worker(State(state): State<App>, Json(req): Json<CreateWorkerRequest>) -> impl IntoResponse {
    match state.engine.create_worker(&req.machine_type).await {
        Ok(worker) => (StatusCode::CREATED, Json(worker)).into_response(),
        Err(e) => response::internal_server_error(e),
    }
}

pub async fn list_workers(State(state): State<App>) -> impl IntoResponse {
    match state.engine.list_workers().await {
        Ok(workers) => (StatusCode::OK, Json(workers)).into_response(),
        Err(e) => response::internal_server_error(e),
    }
}

pub async fn get_worker(State(state): State<App>, Path(machine_id): Path<String>) -> impl IntoResponse {
    match state.engine.get_worker(&machine_id).await {
        Ok(worker) => (StatusCode::OK, Json(worker)).into_response(),
        Err(capacity_kubescaler::Error::Provider { source: capacity_provider::Error::NotFound(id) }) => {
            response::not_found(anyhow::anyhow!("worker {id} not found"))
        }
        Err(e) => response::internal_server_error(e),
    }
}

#[derive(Deserialize)]
pub struct ReserveWorkerRequest {
    pub reserved: bool,
}

pub async fn patch_worker(
    State(state): State<App>,
    Path(machine_id): Path<String>,
    Json(req): Json<ReserveWorkerRequest>,
) -> impl IntoResponse {
    let want = Worker {
        machine_id,
        reserved: req.reserved,
        ..Worker::default()
    };
    match state.engine.reserve_worker(&want).await {
        Ok(worker) => (StatusCode::OK, Json(worker)).into_response(),
        Err(e) => response::internal_server_error(e),
    }
}

#[derive(Deserialize, Default)]
pub struct DeleteWorkerRequest {
    #[serde(default)]
    pub node_name: String,
}

pub async fn delete_worker(
    State(state): State<App>,
    Path(machine_id): Path<String>,
    body: Option<Json<DeleteWorkerRequest>>,
) -> impl IntoResponse {
    let node_name = body.map(|Json(b)| b.node_name).unwrap_or_default();
    match state.engine.delete_worker(&node_name, &machine_id).await {
        Ok(worker) => (StatusCode::OK, Json(worker)).into_response(),
        Err(e) => response::internal_server_error(e),
    }
}
