//! Shared extractors: API key verification, error-to-response mapping.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::FingerprintError;
use crate::http::app::AppState;

/// Extractor enforcing the `X-API-Key` header against `Settings::api_key`.
/// Mirrors the source's `verify_api_key` dependency: every route in this
/// API requires it except `/health`.
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok());
        match provided {
            Some(key) if key == state.settings.api_key => Ok(ApiKey),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "detail": "Invalid or missing API key" })),
            )
                .into_response()),
        }
    }
}

impl IntoResponse for FingerprintError {
    fn into_response(self) -> Response {
        let status = match &self {
            FingerprintError::UnknownDevice(_) | FingerprintError::UnknownUser(_, _) => {
                StatusCode::NOT_FOUND
            }
            FingerprintError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            FingerprintError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            // 503 is reserved for the device-detail route, which reports it
            // from the device's own `online` flag (routes/devices.rs). Every
            // other route surfaces a device-offline failure as a plain 500.
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}
