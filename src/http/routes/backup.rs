use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::domain::backup;
use crate::http::app::AppState;
use crate::http::deps::ApiKey;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/backup/:device", post(trigger_backup))
        .route("/backup/list", get(list_backups))
        .route("/backup/restore/*key", post(restore_backup))
}

async fn trigger_backup(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let Some(s3) = &state.s3 else {
        return crate::error::FingerprintError::InvalidConfig(
            "object storage is not configured".to_string(),
        )
        .into_response();
    };
    match backup::run_backup(&state.pool, &state.cache, s3, &device, true).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ListBackupsQuery {
    device: Option<String>,
}

async fn list_backups(
    _key: ApiKey,
    Query(query): Query<ListBackupsQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(s3) = &state.s3 else {
        return crate::error::FingerprintError::InvalidConfig(
            "object storage is not configured".to_string(),
        )
        .into_response();
    };
    match backup::list_backups(s3, query.device.as_deref()).await {
        Ok(listings) => Json(listings).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct RestoreRequest {
    #[serde(default = "default_true")]
    dry_run: bool,
    target_device: Option<String>,
}

fn default_true() -> bool {
    true
}

async fn restore_backup(
    _key: ApiKey,
    Path(key): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<RestoreRequest>,
) -> Response {
    let Some(s3) = &state.s3 else {
        return crate::error::FingerprintError::InvalidConfig(
            "object storage is not configured".to_string(),
        )
        .into_response();
    };
    match backup::restore_backup(
        &state.pool,
        s3,
        &key,
        body.target_device.as_deref(),
        body.dry_run,
    )
    .await
    {
        Ok(outcome) => Json(serde_json::json!({
            "dry_run": outcome.dry_run,
            "users_restored": outcome.users_restored,
            "fingerprints_restored": outcome.fingerprints_restored,
            "fingerprint_failures": outcome.fingerprint_failures,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}
