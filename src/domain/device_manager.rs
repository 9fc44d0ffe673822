//! Device-level status, time sync, and restart operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DeviceConfig;
use crate::error::Result;
use crate::pool::DevicePool;
use crate::protocol::DeviceInfo;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub key: String,
    pub config: DeviceConfig,
    pub online: bool,
    pub info: Option<DeviceInfo>,
    pub error: Option<String>,
    pub last_check: DateTime<Utc>,
}

pub fn list_devices(pool: &DevicePool) -> Vec<DeviceConfig> {
    pool.list_devices().into_iter().cloned().collect()
}

/// Probe a device: connect and fetch its info, reporting `online: false`
/// with the error message rather than failing the call when the device
/// is unreachable, since a status listing is expected to degrade
/// gracefully for offline devices.
pub async fn get_device_status(pool: &DevicePool, device_key: &str) -> Result<DeviceStatus> {
    let config = pool.get_config(device_key)?.clone();
    let slot = pool.get_slot(device_key)?;

    match slot
        .read(device_key, |c| Box::pin(async move { c.get_device_info().await }))
        .await
    {
        Ok(info) => Ok(DeviceStatus {
            key: device_key.to_string(),
            config,
            online: true,
            info: Some(info),
            error: None,
            last_check: Utc::now(),
        }),
        Err(e) => Ok(DeviceStatus {
            key: device_key.to_string(),
            config,
            online: false,
            info: None,
            error: Some(e.to_string()),
            last_check: Utc::now(),
        }),
    }
}

pub async fn get_all_device_statuses(pool: &DevicePool) -> Vec<DeviceStatus> {
    let mut statuses = Vec::new();
    for key in pool.device_keys() {
        match get_device_status(pool, &key).await {
            Ok(status) => statuses.push(status),
            Err(e) => log::warn!("status check for '{key}' failed: {e}"),
        }
    }
    statuses
}

pub async fn ping_device(pool: &DevicePool, device_key: &str) -> Result<bool> {
    let slot = pool.get_slot(device_key)?;
    Ok(slot.ping().await)
}

pub async fn get_device_time(pool: &DevicePool, device_key: &str) -> Result<DateTime<Utc>> {
    let slot = pool.get_slot(device_key)?;
    slot.read(device_key, |c| Box::pin(async move { c.get_time().await }))
        .await
}

pub async fn sync_device_time(pool: &DevicePool, device_key: &str) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    let slot = pool.get_slot(device_key)?;
    slot.write(device_key, |c| Box::pin(async move { c.set_time(now).await }))
        .await?;
    Ok(now)
}

/// Restarts bypass the disable/enable write-mode guard: the source
/// implementation's `restart()` is deliberately not wrapped in
/// `_write_mode`, since the device is about to reboot regardless of
/// whatever data-entry mode it was left in.
pub async fn restart_device(pool: &DevicePool, device_key: &str) -> Result<()> {
    let slot = pool.get_slot(device_key)?;
    slot.write_unguarded(device_key, |c| Box::pin(async move { c.restart().await }))
        .await
}
