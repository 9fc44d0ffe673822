//! Attendance retrieval, counting, clearing, and HRIS export formatting.

use chrono::{DateTime, Utc};

use crate::cache::AttendanceCache;
use crate::error::Result;
use crate::pool::DevicePool;
use crate::protocol::Attendance;

/// Fetch attendance for a device, preferring the cache and falling back
/// to a live device read when `use_cache` is true but no snapshot exists
/// yet. Always filters to `[date_from, date_to]` and sorts by timestamp.
pub async fn get_attendance(
    pool: &DevicePool,
    cache: &AttendanceCache,
    device_key: &str,
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
    use_cache: bool,
) -> Result<Vec<Attendance>> {
    if use_cache {
        if let Some(records) = cache.get(device_key, date_from, date_to).await {
            return Ok(records);
        }
    }

    let slot = pool.get_slot(device_key)?;
    let mut records = slot
        .read(device_key, |c| Box::pin(async move { c.get_attendance().await }))
        .await?;
    records.retain(|r| date_from.is_none_or(|from| r.timestamp >= from));
    records.retain(|r| date_to.is_none_or(|to| r.timestamp <= to));
    records.sort_by_key(|r| r.timestamp);
    Ok(records)
}

/// Count attendance records, preferring the cache's instant count and
/// falling back to the device's fast `read_sizes` path.
pub async fn count_attendance(
    pool: &DevicePool,
    cache: &AttendanceCache,
    device_key: &str,
) -> Result<usize> {
    if let Some(count) = cache.get_count(device_key).await {
        return Ok(count);
    }
    let slot = pool.get_slot(device_key)?;
    let sizes = slot
        .read(device_key, |c| Box::pin(async move { c.read_sizes().await }))
        .await?;
    Ok(sizes.records as usize)
}

pub async fn clear_attendance(pool: &DevicePool, device_key: &str) -> Result<()> {
    let slot = pool.get_slot(device_key)?;
    slot.write(device_key, |c| Box::pin(async move { c.clear_attendance().await }))
        .await
}

/// HRIS punch-type label, mirroring the source's `punch_types` mapping.
fn punch_type_label(status: u32) -> &'static str {
    match status {
        0 => "Check-In",
        1 => "Check-Out",
        2 => "Break-Out",
        3 => "Break-In",
        4 => "OT-In",
        5 => "OT-Out",
        _ => "Unknown",
    }
}

/// One attendance row shaped for HRIS import.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HrisAttendanceRow {
    pub machine_code: String,
    pub machine_name: String,
    pub device_id: String,
    pub date: String,
    pub time: String,
    pub attendance_type: String,
    pub punch_type: String,
}

/// Map cached/fetched attendance rows into the shape an HRIS import
/// endpoint expects. A pure function: no device or network I/O.
pub fn format_for_hris(
    records: &[Attendance],
    device_key: &str,
    device_name: &str,
) -> Vec<HrisAttendanceRow> {
    records
        .iter()
        .map(|r| HrisAttendanceRow {
            machine_code: device_key.to_string(),
            machine_name: device_name.to_string(),
            device_id: r.user_id.clone(),
            date: r.timestamp.format("%Y-%m-%d").to_string(),
            time: r.timestamp.format("%H:%M:%S").to_string(),
            attendance_type: "regular".to_string(),
            punch_type: punch_type_label(r.status).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_type_falls_back_to_unknown_for_out_of_range_status() {
        assert_eq!(punch_type_label(0), "Check-In");
        assert_eq!(punch_type_label(5), "OT-Out");
        assert_eq!(punch_type_label(99), "Unknown");
    }

    #[test]
    fn format_for_hris_maps_fields() {
        let ts = DateTime::parse_from_rfc3339("2026-01-15T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let rows = format_for_hris(
            &[Attendance {
                uid: 1,
                user_id: "E42".to_string(),
                timestamp: ts,
                status: 1,
                punch: 0,
            }],
            "main_gate",
            "Main Gate",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].device_id, "E42");
        assert_eq!(rows[0].date, "2026-01-15");
        assert_eq!(rows[0].punch_type, "Check-Out");
    }
}
