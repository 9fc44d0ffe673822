use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::attendance;
use crate::error::Result;
use crate::http::app::AppState;
use crate::http::deps::ApiKey;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attendance/:device", get(get_attendance))
        .route("/attendance/:device/count", get(count_attendance))
        .route("/attendance/:device/cache", get(cache_status))
}

#[derive(Debug, Deserialize)]
struct AttendanceQuery {
    #[serde(rename = "from")]
    date_from: Option<String>,
    #[serde(rename = "to")]
    date_to: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    1000
}

#[derive(Debug, Serialize)]
struct AttendanceRecord {
    user_id: String,
    timestamp: String,
    status: u32,
    punch: u32,
}

#[derive(Debug, Serialize)]
struct AttendanceResponse {
    data: Vec<AttendanceRecord>,
    total: usize,
    limit: usize,
    offset: usize,
}

fn parse_bound(s: &str, end_of_day: bool) -> Option<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let naive = if end_of_day {
        date.and_hms_opt(23, 59, 59)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&naive))
}

async fn get_attendance(
    _key: ApiKey,
    Path(device): Path<String>,
    Query(query): Query<AttendanceQuery>,
    State(state): State<AppState>,
) -> Result<Json<AttendanceResponse>> {
    let date_from = query.date_from.as_deref().and_then(|s| parse_bound(s, false));
    let date_to = query.date_to.as_deref().and_then(|s| parse_bound(s, true));

    let records = attendance::get_attendance(
        &state.pool,
        &state.cache,
        &device,
        date_from,
        date_to,
        true,
    )
    .await?;

    let total = records.len();
    let limit = query.limit.clamp(1, 10_000);
    let page: Vec<AttendanceRecord> = records
        .into_iter()
        .skip(query.offset)
        .take(limit)
        .map(|r| AttendanceRecord {
            user_id: r.user_id,
            timestamp: r.timestamp.to_rfc3339(),
            status: r.status,
            punch: r.punch,
        })
        .collect();

    Ok(Json(AttendanceResponse {
        data: page,
        total,
        limit,
        offset: query.offset,
    }))
}

#[derive(Debug, Serialize)]
struct AttendanceCountResponse {
    device: String,
    count: usize,
}

async fn count_attendance(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AttendanceCountResponse>> {
    let count = attendance::count_attendance(&state.pool, &state.cache, &device).await?;
    Ok(Json(AttendanceCountResponse { device, count }))
}

async fn cache_status(
    _key: ApiKey,
    Path(device): Path<String>,
    State(state): State<AppState>,
) -> Json<crate::cache::CacheStatus> {
    Json(state.cache.get_status(&device).await)
}
