//! Attendance Cache: a per-device in-memory snapshot of attendance
//! records, refreshed in the background by the scheduler and served
//! to callers without touching the device on the read path.
//!
//! `refresh` follows a strict three-phase critical-section discipline so
//! that readers never observe a half-updated entry and a failed refresh
//! never destroys the last good snapshot:
//!
//! 1. lock — mark `is_loading`, clear `error`
//! 2. unlocked device I/O (the slow part; never held under the lock)
//! 3. lock — on success, install `records`/`fetched_at`/`count` and clear
//!    `is_loading`; on failure, set `error` and clear `is_loading`,
//!    leaving any previous snapshot untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::pool::DevicePool;
use crate::protocol::Attendance;

struct CacheEntry {
    records: Option<Arc<Vec<Attendance>>>,
    fetched_at: Option<DateTime<Utc>>,
    count: Option<usize>,
    is_loading: bool,
    error: Option<String>,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            records: None,
            fetched_at: None,
            count: None,
            is_loading: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub cached: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub count: Option<usize>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Per-device attendance snapshots, guarded individually so a refresh on
/// one device never blocks reads of another.
pub struct AttendanceCache {
    entries: RwLock<HashMap<String, Arc<RwLock<CacheEntry>>>>,
}

impl Default for AttendanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AttendanceCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn entry_for(&self, device_key: &str) -> Arc<RwLock<CacheEntry>> {
        if let Some(entry) = self.entries.read().await.get(device_key) {
            return entry.clone();
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(device_key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(CacheEntry::default())))
            .clone()
    }

    /// Refresh one device's attendance snapshot from its live session.
    /// Returns the new record count on success. If another refresh for
    /// this device is already in flight, this call is a no-op that
    /// returns the last known count (single-flight semantics — the
    /// scheduler relies on this to honor `max_instances=1` per job).
    pub async fn refresh(&self, pool: &DevicePool, device_key: &str) -> Result<usize> {
        let entry = self.entry_for(device_key).await;

        {
            let mut guard = entry.write().await;
            if guard.is_loading {
                log::debug!("refresh for '{device_key}' already in flight, skipping");
                return Ok(guard.count.unwrap_or(0));
            }
            guard.is_loading = true;
            guard.error = None;
        }

        let slot = match pool.get_slot(device_key) {
            Ok(slot) => slot,
            Err(e) => {
                let mut guard = entry.write().await;
                guard.is_loading = false;
                guard.error = Some(e.to_string());
                return Err(e);
            }
        };

        let fetch_result = slot
            .read(device_key, |c| Box::pin(async move { c.get_attendance().await }))
            .await;

        match fetch_result {
            Ok(mut records) => {
                records.sort_by_key(|r| r.timestamp);
                let count = records.len();
                let mut guard = entry.write().await;
                guard.records = Some(Arc::new(records));
                guard.fetched_at = Some(Utc::now());
                guard.count = Some(count);
                guard.is_loading = false;
                log::info!("refreshed attendance cache for '{device_key}': {count} records");
                Ok(count)
            }
            Err(e) => {
                let mut guard = entry.write().await;
                guard.is_loading = false;
                guard.error = Some(e.to_string());
                log::warn!("refresh failed for '{device_key}': {e}");
                Err(e)
            }
        }
    }

    /// Return cached records filtered to `[date_from, date_to]` inclusive
    /// and sorted by timestamp. `None` means no snapshot has ever been
    /// fetched (distinct from an empty but present snapshot). The lock is
    /// held only long enough to clone the `Arc` reference; filtering and
    /// sorting happen outside it so a slow caller can never hold up a
    /// concurrent refresh.
    pub async fn get(
        &self,
        device_key: &str,
        date_from: Option<DateTime<Utc>>,
        date_to: Option<DateTime<Utc>>,
    ) -> Option<Vec<Attendance>> {
        let entry = self.entry_for(device_key).await;
        let records = {
            let guard = entry.read().await;
            guard.records.clone()?
        };

        let mut result: Vec<Attendance> = records
            .iter()
            .filter(|r| date_from.is_none_or(|from| r.timestamp >= from))
            .filter(|r| date_to.is_none_or(|to| r.timestamp <= to))
            .cloned()
            .collect();
        result.sort_by_key(|r| r.timestamp);
        Some(result)
    }

    pub async fn get_count(&self, device_key: &str) -> Option<usize> {
        let entry = self.entry_for(device_key).await;
        entry.read().await.count
    }

    pub async fn get_records_raw(&self, device_key: &str) -> Option<Vec<Attendance>> {
        let entry = self.entry_for(device_key).await;
        let guard = entry.read().await;
        guard.records.as_ref().map(|r| r.as_ref().clone())
    }

    pub async fn get_status(&self, device_key: &str) -> CacheStatus {
        let entry = self.entry_for(device_key).await;
        let guard = entry.read().await;
        CacheStatus {
            cached: guard.fetched_at.is_some(),
            fetched_at: guard.fetched_at,
            count: guard.count,
            is_loading: guard.is_loading,
            error: guard.error.clone(),
        }
    }

    pub async fn all_statuses(&self, device_keys: &[String]) -> HashMap<String, CacheStatus> {
        let mut out = HashMap::new();
        for key in device_keys {
            out.insert(key.clone(), self.get_status(key).await);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MockProtocolClient;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc as StdArc;

    fn pool_with_mock(records: Vec<Attendance>) -> DevicePool {
        let mut configs = StdHashMap::new();
        configs.insert(
            "main_gate".to_string(),
            crate::config::DeviceConfig {
                name: "Main Gate".to_string(),
                ip: "10.0.0.5".to_string(),
                port: 4370,
                password: 0,
                model: "".to_string(),
                serial: "".to_string(),
            },
        );
        let records = StdArc::new(std::sync::Mutex::new(records));
        DevicePool::new(
            configs,
            StdArc::new(move |_cfg| {
                let mock = MockProtocolClient::new();
                *mock.attendance.lock().unwrap() = records.lock().unwrap().clone();
                Box::new(mock)
            }),
        )
    }

    fn sample_attendance(user_id: &str, ts: DateTime<Utc>) -> Attendance {
        Attendance {
            uid: 1,
            user_id: user_id.to_string(),
            timestamp: ts,
            status: 0,
            punch: 0,
        }
    }

    #[tokio::test]
    async fn get_returns_none_before_first_refresh() {
        let cache = AttendanceCache::new();
        assert!(cache.get("main_gate", None, None).await.is_none());
        assert!(cache.get_count("main_gate").await.is_none());
    }

    #[tokio::test]
    async fn refresh_populates_snapshot_sorted_by_timestamp() {
        let t0 = Utc::now();
        let pool = pool_with_mock(vec![
            sample_attendance("E2", t0 + chrono::Duration::seconds(10)),
            sample_attendance("E1", t0),
        ]);
        let cache = AttendanceCache::new();
        let count = cache.refresh(&pool, "main_gate").await.unwrap();
        assert_eq!(count, 2);

        let records = cache.get("main_gate", None, None).await.unwrap();
        assert_eq!(records[0].user_id, "E1");
        assert_eq!(records[1].user_id, "E2");

        let status = cache.get_status("main_gate").await;
        assert!(status.cached);
        assert!(!status.is_loading);
        assert_eq!(status.count, Some(2));
    }

    #[tokio::test]
    async fn failed_refresh_preserves_previous_snapshot_and_records_error() {
        let pool = pool_with_mock(vec![sample_attendance("E1", Utc::now())]);
        let cache = AttendanceCache::new();
        cache.refresh(&pool, "main_gate").await.unwrap();

        let slot = pool.get_slot("main_gate").unwrap();
        // Force the next read on this slot to fail.
        slot.read::<(), _>("main_gate", |_c| {
            Box::pin(async move {
                Err(crate::error::FingerprintError::Offline(
                    "main_gate".into(),
                    "forced".into(),
                ))
            })
        })
        .await
        .err();

        let status_before = cache.get_status("main_gate").await;
        assert_eq!(status_before.count, Some(1));

        // A real failed refresh: swap in a pool whose slot always errors.
        let mut configs = StdHashMap::new();
        configs.insert(
            "main_gate".to_string(),
            crate::config::DeviceConfig {
                name: "Main Gate".to_string(),
                ip: "10.0.0.5".to_string(),
                port: 4370,
                password: 0,
                model: "".to_string(),
                serial: "".to_string(),
            },
        );
        let failing_pool = DevicePool::new(
            configs,
            StdArc::new(|_cfg| {
                let mock = MockProtocolClient::new();
                mock.fail_next_read
                    .store(true, std::sync::atomic::Ordering::SeqCst);
                Box::new(mock)
            }),
        );
        let err = cache.refresh(&failing_pool, "main_gate").await;
        assert!(err.is_err());

        let status_after = cache.get_status("main_gate").await;
        assert_eq!(status_after.count, Some(1));
        assert!(status_after.error.is_some());
        assert!(!status_after.is_loading);
    }
}
