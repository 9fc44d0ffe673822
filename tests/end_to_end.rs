//! End-to-end scenarios against the three core subsystems (pool, cache,
//! domain facade), driven entirely through `MockProtocolClient` so no
//! socket I/O happens in this suite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use fingerprint_ctl::cache::AttendanceCache;
use fingerprint_ctl::config::{load_devices, DeviceConfig};
use fingerprint_ctl::domain::user_sync;
use fingerprint_ctl::domain::{attendance, device_manager};
use fingerprint_ctl::error::FingerprintError;
use fingerprint_ctl::hris::HrisEmployee;
use fingerprint_ctl::pool::DevicePool;
use fingerprint_ctl::protocol::{Attendance, MockProtocolClient, User};

fn device_config(ip: &str, port: u16) -> DeviceConfig {
    DeviceConfig {
        name: ip.to_string(),
        ip: ip.to_string(),
        port,
        password: 0,
        model: String::new(),
        serial: String::new(),
    }
}

fn ts(s: &str) -> DateTime<Utc> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap();
    Utc.from_utc_datetime(&naive)
}

/// Scenario 1: pool loads a YAML devices map, lists keys in order, defaults
/// an omitted `port`, and fails `UnknownDevice` for an unconfigured key.
#[test]
fn pool_loads_yaml_and_resolves_known_and_unknown_devices() {
    let dir = std::env::temp_dir().join(format!(
        "fingerprint-ctl-test-{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("devices.yaml");
    std::fs::write(
        &path,
        r#"
devices:
  tmi:
    ip: 10.0.0.1
  outsourcing:
    ip: 10.0.0.2
    port: 4371
"#,
    )
    .unwrap();

    let devices = load_devices(&path).unwrap();
    let pool = DevicePool::new(
        devices,
        Arc::new(|_cfg| Box::new(MockProtocolClient::new())),
    );

    assert_eq!(pool.device_keys(), vec!["outsourcing", "tmi"]);
    assert_eq!(pool.get_config("tmi").unwrap().port, 4370);
    assert_eq!(pool.get_config("outsourcing").unwrap().port, 4371);
    assert!(matches!(
        pool.get_config("missing"),
        Err(FingerprintError::UnknownDevice(_))
    ));

    std::fs::remove_file(&path).ok();
    std::fs::remove_dir(&dir).ok();
}

fn mock_pool(attendance_records: Vec<Attendance>) -> DevicePool {
    let mut configs = HashMap::new();
    configs.insert("tmi".to_string(), device_config("10.0.0.1", 4370));
    let records = Arc::new(Mutex::new(attendance_records));
    DevicePool::new(
        configs,
        Arc::new(move |_cfg| {
            let mock = MockProtocolClient::new();
            *mock.attendance.lock().unwrap() = records.lock().unwrap().clone();
            Box::new(mock)
        }),
    )
}

fn attendance_row(user_id: &str, timestamp: DateTime<Utc>) -> Attendance {
    Attendance {
        uid: 1,
        user_id: user_id.to_string(),
        timestamp,
        status: 0,
        punch: 0,
    }
}

/// Scenario 2: refreshing against a device with three attendance records
/// returns the full count, and a bounded `get` returns exactly the records
/// inside the window, sorted.
#[tokio::test]
async fn cache_refresh_and_filtered_get() {
    let pool = mock_pool(vec![
        attendance_row("E1", ts("2024-01-01T08:00")),
        attendance_row("E2", ts("2024-01-01T09:00")),
        attendance_row("E3", ts("2024-01-01T10:00")),
    ]);
    let cache = AttendanceCache::new();

    let count = cache.refresh(&pool, "tmi").await.unwrap();
    assert_eq!(count, 3);

    let windowed = cache
        .get("tmi", Some(ts("2024-01-01T00:00")), Some(ts("2024-01-01T09:30")))
        .await
        .unwrap();
    assert_eq!(windowed.len(), 2);
    assert_eq!(windowed[0].user_id, "E1");
    assert_eq!(windowed[1].user_id, "E2");
}

/// Scenario 3: a failing device read leaves `status().error` set and, for
/// a device that has never had a successful refresh, `get` still reports
/// MISS rather than an empty snapshot.
#[tokio::test]
async fn failed_first_refresh_leaves_cache_in_miss_state_with_error_recorded() {
    let mut configs = HashMap::new();
    configs.insert("tmi".to_string(), device_config("10.0.0.1", 4370));
    let pool = DevicePool::new(
        configs,
        Arc::new(|_cfg| {
            let mock = MockProtocolClient::new();
            mock.fail_next_read
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Box::new(mock)
        }),
    );
    let cache = AttendanceCache::new();

    let err = cache.refresh(&pool, "tmi").await;
    assert!(err.is_err());

    let status = cache.get_status("tmi").await;
    assert!(status.error.is_some());
    assert!(!status.cached);
    assert!(cache.get("tmi", None, None).await.is_none());
}

/// Scenario 4: `count_attendance` falls back to the device's `read_sizes`
/// fast path when the cache has no snapshot yet, and prefers the cached
/// count (no device round trip) once one exists.
#[tokio::test]
async fn count_attendance_prefers_cache_over_device_round_trip() {
    let pool = mock_pool(vec![
        attendance_row("E1", ts("2024-01-01T08:00")),
        attendance_row("E2", ts("2024-01-01T09:00")),
    ]);
    let cache = AttendanceCache::new();

    let count_before_refresh = attendance::count_attendance(&pool, &cache, "tmi")
        .await
        .unwrap();
    assert_eq!(count_before_refresh, 2);

    cache.refresh(&pool, "tmi").await.unwrap();

    let count_after_refresh = attendance::count_attendance(&pool, &cache, "tmi")
        .await
        .unwrap();
    assert_eq!(count_after_refresh, 2);
}

/// Scenario 6: syncing against an HRIS roster that has one matching
/// employee and one new employee produces the expected add/update/
/// unchanged partition, and a dry run performs no device writes.
#[tokio::test]
async fn sync_users_from_hris_partitions_add_update_unchanged() {
    let mut configs = HashMap::new();
    configs.insert("tmi".to_string(), device_config("10.0.0.1", 4370));
    let users = Arc::new(Mutex::new(vec![User {
        uid: 1,
        user_id: "E1".to_string(),
        name: "A".to_string(),
        privilege: 0,
        password: String::new(),
        group_id: "0".to_string(),
        card: 0,
    }]));
    let users_for_factory = users.clone();
    let pool = DevicePool::new(
        configs,
        Arc::new(move |_cfg| {
            let mock = MockProtocolClient::new();
            *mock.users.lock().unwrap() = users_for_factory.lock().unwrap().clone();
            Box::new(mock)
        }),
    );

    let employees = vec![
        HrisEmployee {
            identification_id: "E1".to_string(),
            name: "A".to_string(),
        },
        HrisEmployee {
            identification_id: "E2".to_string(),
            name: "B".to_string(),
        },
    ];

    let dry_run_outcome = user_sync::sync_from_hris(&pool, "tmi", &employees, true)
        .await
        .unwrap();
    assert_eq!(dry_run_outcome.added, 1);
    assert_eq!(dry_run_outcome.updated, 0);
    assert_eq!(dry_run_outcome.unchanged, 1);
    assert!(dry_run_outcome.details_add[0].contains("uid=2"));

    // Dry run must not have touched the device.
    let still_one_user = user_sync::get_users(&pool, "tmi").await.unwrap();
    assert_eq!(still_one_user.len(), 1);

    let applied_outcome = user_sync::sync_from_hris(&pool, "tmi", &employees, false)
        .await
        .unwrap();
    assert_eq!(applied_outcome.added, 1);

    let after_sync = user_sync::get_users(&pool, "tmi").await.unwrap();
    assert_eq!(after_sync.len(), 2);
    assert!(after_sync.iter().any(|u| u.user_id == "E2" && u.uid == 2));
}

/// A device that fails to answer `get_device_info` is reported offline
/// rather than failing the whole status call, so a fleet-wide listing
/// degrades gracefully instead of aborting at the first unreachable unit.
#[tokio::test]
async fn device_status_reports_offline_instead_of_propagating_error() {
    let mut configs = HashMap::new();
    configs.insert("tmi".to_string(), device_config("10.0.0.1", 4370));
    let pool = DevicePool::new(
        configs,
        Arc::new(|_cfg| {
            let mock = MockProtocolClient::new();
            mock.fail_next_read
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Box::new(mock)
        }),
    );

    let status = device_manager::get_device_status(&pool, "tmi").await.unwrap();
    assert!(!status.online);
    assert!(status.error.is_some());
}
