use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::domain::user_sync::{self, UserUpdate};
use crate::http::app::AppState;
use crate::http::deps::ApiKey;
use crate::protocol::User;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/:device", get(list_users).post(create_user))
        .route(
            "/users/:device/:uid",
            put(update_user).delete(delete_user),
        )
        .route("/users/:device/sync", post(sync_users))
}

async fn list_users(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match user_sync::get_users(&state.pool, &device).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    uid: u32,
    user_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    privilege: u32,
    #[serde(default)]
    password: String,
    #[serde(default = "default_group_id")]
    group_id: String,
    #[serde(default)]
    card: u64,
}

fn default_group_id() -> String {
    "0".to_string()
}

async fn create_user(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Response {
    let user = User {
        uid: body.uid,
        user_id: body.user_id,
        name: body.name,
        privilege: body.privilege,
        password: body.password,
        group_id: body.group_id,
        card: body.card,
    };
    match user_sync::add_user(&state.pool, &device, user).await {
        Ok(()) => Json(serde_json::json!({ "created": true })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize, Default)]
struct UpdateUserRequest {
    name: Option<String>,
    privilege: Option<u32>,
    password: Option<String>,
    group_id: Option<String>,
    card: Option<u64>,
}

/// The path parameter is named `uid` but carries the device-assigned
/// numeric uid of the user, not a string `user_id` — the same naming
/// quirk the source implementation carries in its route signature.
async fn update_user(
    _key: ApiKey,
    Path((device, uid)): Path<(String, u32)>,
    State(state): State<AppState>,
    Json(body): Json<UpdateUserRequest>,
) -> Response {
    let update = UserUpdate {
        name: body.name,
        privilege: body.privilege,
        password: body.password,
        group_id: body.group_id,
        card: body.card,
    };
    match user_sync::update_user(&state.pool, &device, uid, update).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_user(
    _key: ApiKey,
    Path((device, uid)): Path<(String, u32)>,
    State(state): State<AppState>,
) -> Response {
    match user_sync::delete_user(&state.pool, &device, uid).await {
        Ok(()) => Json(serde_json::json!({ "deleted": true })).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SyncRequest {
    #[serde(default = "default_true")]
    dry_run: bool,
}

fn default_true() -> bool {
    true
}

async fn sync_users(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<SyncRequest>,
) -> Response {
    let Some(hris) = &state.hris else {
        return crate::error::FingerprintError::InvalidConfig(
            "HRIS integration is not configured".to_string(),
        )
        .into_response();
    };

    let employees = match hris.fetch_employees().await {
        Ok(employees) => employees,
        Err(e) => return e.into_response(),
    };

    match user_sync::sync_from_hris(&state.pool, &device, &employees, body.dry_run).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => e.into_response(),
    }
}
