//! Runtime configuration: environment-driven `Settings` plus the per-device
//! YAML registry loaded from `ZK_MACHINES_CONFIG`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FingerprintError, Result};

/// A single configured biometric terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: u32,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial: String,
}

fn default_port() -> u16 {
    4370
}

/// Top-level shape of the device YAML file: a `devices:` map keyed by the
/// short device identifier used throughout the HTTP/CLI surface. Unknown
/// fields inside a device entry are ignored rather than rejected.
#[derive(Debug, Deserialize)]
struct DeviceFile {
    devices: HashMap<String, DeviceConfig>,
}

/// Load the `devices:` map from a YAML file on disk. A device with no `ip`
/// fails the whole load with `InvalidConfig`; a device with no `name`
/// defaults to its map key.
pub fn load_devices(path: impl AsRef<Path>) -> Result<HashMap<String, DeviceConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let parsed: DeviceFile = serde_yaml::from_str(&raw)?;

    let mut devices = parsed.devices;
    for (key, device) in devices.iter_mut() {
        if device.ip.is_empty() {
            return Err(FingerprintError::InvalidConfig(format!(
                "device '{key}' is missing required field 'ip'"
            )));
        }
        if device.name.is_empty() {
            device.name = key.clone();
        }
    }
    Ok(devices)
}

/// Process-wide settings, populated from environment variables. Mirrors the
/// `.env.local` then `.env` precedence used across the rest of the pack.
#[derive(Debug, Clone)]
pub struct Settings {
    pub zk_machines_config: String,
    pub api_host: String,
    pub api_port: u16,
    pub api_key: String,
    pub cors_origins: Vec<String>,

    pub s3_endpoint: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_region: String,

    pub hris_base_url: Option<String>,
    pub hris_api_key: Option<String>,
    pub hris_employees_path: String,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub mattermost_webhook_url: Option<String>,

    pub cache_refresh_minutes: u64,
    pub backup_hour_utc: u32,
    pub backup_minute_utc: u32,
    pub backup_retention_days: u32,
    pub scheduler_enabled: bool,

    pub environment: String,
    pub log_level: String,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_var(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_var(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Load `.env.local` then `.env` (both optional) and read the process
    /// environment, matching the precedence of the source implementation's
    /// `pydantic_settings` configuration.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();

        let cors_origins = env_var("API_CORS_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        Ok(Settings {
            zk_machines_config: env_or("ZK_MACHINES_CONFIG", "devices.yaml"),
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: env_parse_or("API_PORT", 8000),
            api_key: env_var("API_KEY").ok_or_else(|| {
                FingerprintError::InvalidConfig("API_KEY is required".to_string())
            })?,
            cors_origins,

            s3_endpoint: env_var("S3_ENDPOINT"),
            s3_bucket: env_var("S3_BUCKET"),
            s3_access_key: env_var("S3_ACCESS_KEY"),
            s3_secret_key: env_var("S3_SECRET_KEY"),
            s3_region: env_or("S3_REGION", "eu-central"),

            hris_base_url: env_var("HRIS_BASE_URL"),
            hris_api_key: env_var("HRIS_API_KEY"),
            hris_employees_path: env_or("HRIS_EMPLOYEES_PATH", "/api/employees"),

            telegram_bot_token: env_var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: env_var("TELEGRAM_CHAT_ID"),
            mattermost_webhook_url: env_var("MATTERMOST_WEBHOOK_URL"),

            cache_refresh_minutes: env_parse_or("CACHE_REFRESH_MINUTES", 15),
            backup_hour_utc: env_parse_or("BACKUP_HOUR_UTC", 2),
            backup_minute_utc: env_parse_or("BACKUP_MINUTE_UTC", 0),
            backup_retention_days: env_parse_or("BACKUP_RETENTION_DAYS", 90),
            scheduler_enabled: env_parse_or("SCHEDULER_ENABLED", true),

            environment: env_or("ENVIRONMENT", "development"),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_config_defaults_port_and_optional_fields() {
        let yaml = r#"
devices:
  main_gate:
    name: Main Gate
    ip: 10.0.0.5
"#;
        let parsed: DeviceFile = serde_yaml::from_str(yaml).unwrap();
        let dev = parsed.devices.get("main_gate").unwrap();
        assert_eq!(dev.port, 4370);
        assert_eq!(dev.password, 0);
        assert_eq!(dev.ip, "10.0.0.5");
    }
}
