//! Object storage client for backup upload/download/listing/cleanup,
//! speaking an S3-compatible endpoint (Hetzner Object Storage in
//! production).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Settings;
use crate::domain::backup::BackupRecord;
use crate::error::{FingerprintError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct BackupListing {
    pub key: String,
    pub device_key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

pub struct S3Client {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Client {
    pub async fn from_settings(settings: &Settings) -> Option<Self> {
        let bucket = settings.s3_bucket.clone()?;
        let endpoint = settings.s3_endpoint.clone()?;
        let access_key = settings.s3_access_key.clone()?;
        let secret_key = settings.s3_secret_key.clone()?;

        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "fingerprint-ctl",
        );
        let config = aws_sdk_s3::Config::builder()
            .region(aws_sdk_s3::config::Region::new(settings.s3_region.clone()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .force_path_style(true)
            .build();

        Some(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket,
        })
    }

    fn backup_key(device_key: &str, when: DateTime<Utc>) -> String {
        format!(
            "backups/{device_key}/{}.json",
            when.format("%Y-%m-%d_%H-%M-%S")
        )
    }

    pub async fn upload_backup(&self, device_key: &str, record: &BackupRecord) -> Result<String> {
        let key = Self::backup_key(device_key, record.timestamp);
        let body = serde_json::to_vec_pretty(record)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body.into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| FingerprintError::S3(e.to_string()))?;
        Ok(key)
    }

    pub async fn download_backup(&self, key: &str) -> Result<BackupRecord> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FingerprintError::S3(e.to_string()))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| FingerprintError::S3(e.to_string()))?
            .into_bytes();
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn list_backups(&self, device_key: Option<&str>) -> Result<Vec<BackupListing>> {
        let prefix = match device_key {
            Some(key) => format!("backups/{key}/"),
            None => "backups/".to_string(),
        };

        let mut listings = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let page = req
                .send()
                .await
                .map_err(|e| FingerprintError::S3(e.to_string()))?;

            for obj in page.contents() {
                let Some(key) = obj.key() else { continue };
                if !key.ends_with(".json") {
                    continue;
                }
                let device_key = key
                    .strip_prefix("backups/")
                    .and_then(|rest| rest.split('/').next())
                    .unwrap_or_default()
                    .to_string();
                listings.push(BackupListing {
                    key: key.to_string(),
                    device_key,
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), 0)),
                });
            }

            continuation = page.next_continuation_token().map(str::to_string);
            if continuation.is_none() {
                break;
            }
        }

        listings.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(listings)
    }

    pub async fn delete_backup(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| FingerprintError::S3(e.to_string()))?;
        Ok(())
    }

    /// Delete backups older than `retention_days`, returning the number
    /// removed.
    pub async fn cleanup_old_backups(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let listings = self.list_backups(None).await?;
        let mut removed = 0;
        for listing in listings {
            if listing.last_modified.map(|lm| lm < cutoff).unwrap_or(false) {
                self.delete_backup(&listing.key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn test_connection(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }
}
