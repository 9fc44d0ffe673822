//! axum application factory wiring routes, CORS, auth, and logging.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::AttendanceCache;
use crate::config::Settings;
use crate::hris::HrisClient;
use crate::http::middleware::log_requests;
use crate::http::routes;
use crate::pool::DevicePool;
use crate::storage::S3Client;

/// Shared application state, cloned cheaply (all fields are `Arc`) into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pool: Arc<DevicePool>,
    pub cache: Arc<AttendanceCache>,
    pub s3: Option<Arc<S3Client>>,
    pub hris: Option<Arc<HrisClient>>,
}

pub fn build_app(state: AppState) -> Router {
    let cors_origins = state.settings.cors_origins.clone();
    let cors = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<_> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let api_routes = Router::new()
        .merge(routes::attendance::router())
        .merge(routes::devices::router())
        .merge(routes::users::router())
        .merge(routes::fingerprints::router())
        .merge(routes::backup::router());

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn(log_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "fingerprint-ctl",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    let device_keys = state.pool.device_keys();
    let statuses = state.cache.all_statuses(&device_keys).await;
    axum::Json(serde_json::json!({
        "scheduler_running": state.settings.scheduler_enabled,
        "devices_configured": device_keys.len(),
        "cache": statuses,
    }))
}
