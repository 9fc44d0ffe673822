//! Fingerprint template retrieval and per-user summaries.

use std::collections::HashMap;

use base64::Engine;

use crate::error::{FingerprintError, Result};
use crate::pool::DevicePool;
use crate::protocol::Fingerprint;

pub async fn get_fingerprints(
    pool: &DevicePool,
    device_key: &str,
    user_id: Option<&str>,
) -> Result<Vec<Fingerprint>> {
    let slot = pool.get_slot(device_key)?;
    let templates = slot
        .read(device_key, |c| Box::pin(async move { c.get_templates().await }))
        .await?;
    Ok(match user_id {
        Some(uid) => templates.into_iter().filter(|f| f.user_id == uid).collect(),
        None => templates,
    })
}

pub async fn count_fingerprints(pool: &DevicePool, device_key: &str) -> Result<usize> {
    let slot = pool.get_slot(device_key)?;
    let sizes = slot
        .read(device_key, |c| Box::pin(async move { c.read_sizes().await }))
        .await?;
    Ok(sizes.fingers as usize)
}

/// Map each enrolled user_id to how many fingerprint templates they have
/// on file.
pub async fn get_fingerprint_summary(
    pool: &DevicePool,
    device_key: &str,
) -> Result<HashMap<String, usize>> {
    let templates = get_fingerprints(pool, device_key, None).await?;
    let mut summary = HashMap::new();
    for fp in templates {
        *summary.entry(fp.user_id).or_insert(0) += 1;
    }
    Ok(summary)
}

/// Enrolls one fingerprint template, given as base64 — the transport
/// encoding for the opaque per-finger byte string the device stores.
/// Malformed base64 is rejected before it ever reaches the device.
pub async fn set_fingerprint(
    pool: &DevicePool,
    device_key: &str,
    uid: u32,
    finger_index: u32,
    template_b64: &str,
) -> Result<()> {
    base64::engine::general_purpose::STANDARD
        .decode(template_b64)
        .map_err(|e| {
            FingerprintError::RemoteWriteFailure(
                device_key.to_string(),
                format!("template is not valid base64: {e}"),
            )
        })?;

    let slot = pool.get_slot(device_key)?;
    let template = template_b64.to_string();
    slot.write(device_key, |c| {
        Box::pin(async move { c.set_fingerprint(uid, finger_index, &template).await })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::protocol::MockProtocolClient;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    fn pool_with_templates(templates: Vec<Fingerprint>) -> DevicePool {
        let mut configs = StdHashMap::new();
        configs.insert(
            "main_gate".to_string(),
            DeviceConfig {
                name: "Main Gate".to_string(),
                ip: "10.0.0.5".to_string(),
                port: 4370,
                password: 0,
                model: String::new(),
                serial: String::new(),
            },
        );
        let templates = Arc::new(std::sync::Mutex::new(templates));
        DevicePool::new(
            configs,
            Arc::new(move |_cfg| {
                let mock = MockProtocolClient::new();
                *mock.templates.lock().unwrap() = templates.lock().unwrap().clone();
                Box::new(mock)
            }),
        )
    }

    #[tokio::test]
    async fn summary_counts_templates_per_user() {
        let pool = pool_with_templates(vec![
            Fingerprint {
                uid: 1,
                user_id: "E1".to_string(),
                finger_index: 0,
                template: "aa".to_string(),
                valid: 1,
            },
            Fingerprint {
                uid: 1,
                user_id: "E1".to_string(),
                finger_index: 1,
                template: "bb".to_string(),
                valid: 1,
            },
            Fingerprint {
                uid: 2,
                user_id: "E2".to_string(),
                finger_index: 0,
                template: "cc".to_string(),
                valid: 1,
            },
        ]);
        let summary = get_fingerprint_summary(&pool, "main_gate").await.unwrap();
        assert_eq!(summary.get("E1"), Some(&2));
        assert_eq!(summary.get("E2"), Some(&1));
    }

    #[tokio::test]
    async fn set_fingerprint_rejects_malformed_base64_without_touching_device() {
        let pool = pool_with_templates(vec![]);
        let err = set_fingerprint(&pool, "main_gate", 1, 0, "not-valid-base64!!")
            .await
            .unwrap_err();
        assert!(matches!(err, FingerprintError::RemoteWriteFailure(_, _)));
        assert!(get_fingerprints(&pool, "main_gate", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_fingerprint_accepts_valid_base64() {
        let pool = pool_with_templates(vec![]);
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fingerprint-bytes");
        set_fingerprint(&pool, "main_gate", 1, 0, &encoded).await.unwrap();
        let templates = get_fingerprints(&pool, "main_gate", None).await.unwrap();
        assert_eq!(templates[0].template, encoded);
    }
}
