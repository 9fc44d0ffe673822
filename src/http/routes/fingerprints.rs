use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};

use crate::domain::fingerprint;
use crate::http::app::AppState;
use crate::http::deps::ApiKey;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fingerprints/:device/count", get(count_fingerprints))
        .route("/fingerprints/:device/:user_id", get(get_fingerprints))
}

async fn get_fingerprints(
    _key: ApiKey,
    Path((device, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    match fingerprint::get_fingerprints(&state.pool, &device, Some(&user_id)).await {
        Ok(templates) => Json(templates).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn count_fingerprints(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let count = match fingerprint::count_fingerprints(&state.pool, &device).await {
        Ok(count) => count,
        Err(e) => return e.into_response(),
    };
    let summary = match fingerprint::get_fingerprint_summary(&state.pool, &device).await {
        Ok(summary) => summary,
        Err(e) => return e.into_response(),
    };
    Json(serde_json::json!({
        "device": device,
        "count": count,
        "users_with_fingerprints": summary.len(),
    }))
    .into_response()
}
