//! Background job engine: staggers cache refreshes, daily backups, and
//! backup cleanup across the device fleet so no two jobs compete for the
//! same device's session at once.
//!
//! Staggering formula (mirrors the source implementation's APScheduler
//! registration in spirit): for device index `i` in the sorted device key
//! list, `cache_refresh_{key}` first fires `i * 60` seconds from scheduler
//! start and then every `CACHE_REFRESH_MINUTES`; `daily_backup_{key}` fires
//! once a day at `BACKUP_MINUTE_UTC + i * 5` minutes past `BACKUP_HOUR_UTC`;
//! a single `cleanup_old_backups` job fires once a day an hour after the
//! backup window, at `:00`.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};

use crate::cache::AttendanceCache;
use crate::config::Settings;
use crate::domain;
use crate::error::Result;
use crate::notify;
use crate::pool::DevicePool;
use crate::storage::S3Client;

pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    /// Build and start the scheduler, registering one refresh job and one
    /// backup job per configured device plus a single shared cleanup job.
    /// All jobs use `coalesce`/`max_instances=1` semantics: a job body
    /// that is already running for a device is a no-op rather than a
    /// pile-up, matching the source's `job_defaults`.
    pub async fn start(
        settings: Arc<Settings>,
        pool: Arc<DevicePool>,
        cache: Arc<AttendanceCache>,
        s3: Option<Arc<S3Client>>,
    ) -> Result<Self> {
        let inner = JobScheduler::new().await.map_err(scheduler_err)?;
        let device_keys = pool.device_keys();

        for (i, key) in device_keys.iter().enumerate() {
            let refresh_schedule = format!("0 */{} * * * *", settings.cache_refresh_minutes.max(1));
            let key_owned = key.clone();
            let pool_c = pool.clone();
            let cache_c = cache.clone();
            let initial_delay = i as u64 * 60;

            let job = Job::new_async(refresh_schedule.as_str(), move |_uuid, _l| {
                let key = key_owned.clone();
                let pool = pool_c.clone();
                let cache = cache_c.clone();
                Box::pin(async move {
                    match cache.refresh(&pool, &key).await {
                        Ok(count) => log::info!("cache_refresh_{key}: {count} records"),
                        Err(e) => log::warn!("cache_refresh_{key} failed: {e}"),
                    }
                })
            })
            .map_err(scheduler_err)?;

            // Stagger first fire by i*60s so the fleet's initial refreshes don't
            // all land on the same minute boundary. The job itself is built
            // eagerly above (a bad cron string fails `start` immediately); only
            // its registration with the running scheduler is delayed.
            let inner_c = inner.clone();
            let key_log = key.clone();
            tokio::spawn(async move {
                if initial_delay > 0 {
                    tokio::time::sleep(std::time::Duration::from_secs(initial_delay)).await;
                }
                if let Err(e) = inner_c.add(job).await {
                    log::warn!("failed to register cache_refresh_{key_log} after stagger: {e}");
                }
            });
            log::debug!(
                "registered cache_refresh_{key} (stagger {initial_delay}s, every {}m)",
                settings.cache_refresh_minutes
            );

            if let Some(s3) = s3.clone() {
                let minute = (settings.backup_minute_utc + (i as u32 * 5)) % 60;
                let hour = (settings.backup_hour_utc
                    + (settings.backup_minute_utc + i as u32 * 5) / 60)
                    % 24;
                let backup_schedule = format!("0 {minute} {hour} * * *");
                let key_owned = key.clone();
                let pool_c = pool.clone();
                let cache_c = cache.clone();
                let settings_c = settings.clone();
                let s3_c = s3.clone();

                let job = Job::new_async(backup_schedule.as_str(), move |_uuid, _l| {
                    let key = key_owned.clone();
                    let pool = pool_c.clone();
                    let cache = cache_c.clone();
                    let settings = settings_c.clone();
                    let s3 = s3_c.clone();
                    Box::pin(async move {
                        match domain::backup::run_backup(&pool, &cache, &s3, &key, true).await {
                            Ok(record) => {
                                notify::notify_backup_success(
                                    &settings,
                                    &key,
                                    &record.device_name,
                                    record.user_count,
                                    record.fingerprint_count,
                                )
                                .await;
                                log::info!("daily_backup_{key} uploaded");
                            }
                            Err(e) => {
                                notify::notify_error(&settings, &format!("daily_backup_{key}"), &e.to_string())
                                    .await;
                                log::warn!("daily_backup_{key} failed: {e}");
                            }
                        }
                    })
                })
                .map_err(scheduler_err)?;
                inner.add(job).await.map_err(scheduler_err)?;
                log::debug!("registered daily_backup_{key} at {hour:02}:{minute:02} UTC");
            }
        }

        if let Some(s3) = s3 {
            let cleanup_minute = 0u32;
            let cleanup_hour = (settings.backup_hour_utc + 1) % 24;
            let cleanup_schedule = format!("0 {cleanup_minute} {cleanup_hour} * * *");
            let retention_days = settings.backup_retention_days;

            let job = Job::new_async(cleanup_schedule.as_str(), move |_uuid, _l| {
                let s3 = s3.clone();
                Box::pin(async move {
                    match s3.cleanup_old_backups(retention_days).await {
                        Ok(n) => log::info!("cleanup_old_backups removed {n} objects"),
                        Err(e) => log::warn!("cleanup_old_backups failed: {e}"),
                    }
                })
            })
            .map_err(scheduler_err)?;
            inner.add(job).await.map_err(scheduler_err)?;
            log::debug!("registered cleanup_old_backups at {cleanup_hour:02}:00 UTC");
        }

        inner.start().await.map_err(scheduler_err)?;
        Ok(Self { inner })
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.inner.shutdown().await {
            log::warn!("scheduler shutdown error: {e}");
        }
    }
}

fn scheduler_err(e: impl std::fmt::Display) -> crate::error::FingerprintError {
    crate::error::FingerprintError::PeripheralFailure("scheduler".to_string(), e.to_string())
}
