use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::domain::device_manager;
use crate::http::app::AppState;
use crate::http::deps::ApiKey;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices))
        .route("/devices/:name", get(device_status))
        .route("/devices/:name/restart", post(restart_device))
        .route("/devices/:name/time", get(get_time).put(set_time))
}

async fn list_devices(_key: ApiKey, State(state): State<AppState>) -> Json<serde_json::Value> {
    let statuses = device_manager::get_all_device_statuses(&state.pool).await;
    Json(serde_json::json!({ "devices": statuses }))
}

async fn device_status(
    _key: ApiKey,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match device_manager::get_device_status(&state.pool, &name).await {
        Ok(status) if status.online => (StatusCode::OK, Json(status)).into_response(),
        Ok(status) => (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn restart_device(
    _key: ApiKey,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match device_manager::restart_device(&state.pool, &name).await {
        Ok(()) => Json(serde_json::json!({ "restarted": true })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Serialize)]
struct TimeResponse {
    device: String,
    time: String,
}

async fn get_time(
    _key: ApiKey,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match device_manager::get_device_time(&state.pool, &name).await {
        Ok(time) => Json(TimeResponse {
            device: name,
            time: time.to_rfc3339(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SetTimeRequest {}

async fn set_time(
    _key: ApiKey,
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(_body): Json<SetTimeRequest>,
) -> Response {
    match device_manager::sync_device_time(&state.pool, &name).await {
        Ok(time) => Json(TimeResponse {
            device: name,
            time: time.to_rfc3339(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
