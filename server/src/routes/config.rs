use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use capacity_types::{Config, ConfigPatch};

use capacity_common::response;

use crate::app::App;

pub async fn get_config(State(state): State<App>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.engine.get_config().await))
}

/// Establishes the initial config. Legal only while no config has been set yet
/// (`cluster_name` still blank); afterwards callers must use `PATCH`.
pub async fn post_config(State(state): State<App>, Json(conf): Json<Config>) -> impl IntoResponse {
    if !state.engine.get_config().await.cluster_name.is_empty() {
        return response::conflict(anyhow::anyhow!("config already exists, use PATCH to update it"));
    }
    match state.engine.set_config(conf).await {
        Ok(()) => (StatusCode::CREATED, Json(state.engine.get_config().await)).into_response(),
        Err(e) => response::bad_request(e),
    }
}

pub async fn patch_config(State(state): State<App>, Json(patch): Json<ConfigPatch>) -> impl IntoResponse {
    match state.engine.patch_config(patch).await {
        Ok(conf) => (StatusCode::OK, Json(conf)).into_response(),
        Err(e) => response::bad_request(e),
    }
}
