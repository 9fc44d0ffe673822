//! Device Connection Manager: a thread-safe, retry-wrapped registry of
//! per-device protocol clients.
//!
//! One [`ClientSlot`] per configured device serializes all access to that
//! device's session behind a `tokio::sync::Mutex` — two callers can never
//! be mid-command on the same device at once, and a held lock across an
//! `await` is how the spec's "no re-entrant session acquisition" rule is
//! enforced: a caller that tries to reacquire its own device's slot from
//! inside the closure it is already running in will deadlock rather than
//! corrupt device state.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::DeviceConfig;
use crate::error::{FingerprintError, Result};
use crate::protocol::DeviceProtocol;
use crate::retry::with_retry;

/// Builds a fresh, not-yet-connected protocol client for a device config.
/// Production wiring plugs in `ZkProtocolClient::new`; tests plug in a
/// closure that hands back a pre-scripted `MockProtocolClient`.
pub type ClientFactory = Arc<dyn Fn(&DeviceConfig) -> Box<dyn DeviceProtocol> + Send + Sync>;

/// Serializes access to one device's session and owns its write-mode
/// guard discipline.
pub struct ClientSlot {
    pub config: DeviceConfig,
    client: Mutex<Box<dyn DeviceProtocol>>,
}

impl ClientSlot {
    fn new(config: DeviceConfig, client: Box<dyn DeviceProtocol>) -> Self {
        Self {
            config,
            client: Mutex::new(client),
        }
    }

    async fn ensure_connected(client: &mut Box<dyn DeviceProtocol>, device: &str) -> Result<()> {
        if !client.ping().await {
            client.connect().await.map_err(|e| {
                FingerprintError::Offline(device.to_string(), format!("connect failed: {e}"))
            })?;
        }
        Ok(())
    }

    /// Run a read-only operation against this device's session, retrying
    /// transient failures with backoff. Never used for writes: a retried
    /// write could double-apply a side effect on the device.
    ///
    /// `op` returns a boxed, explicitly lifetime-bound future rather than a
    /// bare `impl Future` — a generic `Fut: Future<Output = _>` parameter
    /// can't express that the returned future borrows `op`'s `&dyn
    /// DeviceProtocol` argument, which fails to unify across the closure's
    /// higher-ranked lifetime. Boxing sidesteps that.
    pub async fn read<T, F>(&self, device: &str, op: F) -> Result<T>
    where
        F: for<'a> Fn(&'a dyn DeviceProtocol) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        with_retry(|| async {
            let mut guard = self.client.lock().await;
            Self::ensure_connected(&mut guard, device).await?;
            op(guard.as_ref()).await
        })
        .await
    }

    /// Run a write operation wrapped in the device's disable/enable guard.
    /// The guard is best-effort on teardown: `enable_device` failures are
    /// logged, never propagated, so a session is never left stuck in a
    /// half-disabled state because of a logging-worthy but non-fatal
    /// re-enable failure.
    pub async fn write<T, F>(&self, device: &str, op: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a dyn DeviceProtocol) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        let mut guard = self.client.lock().await;
        Self::ensure_connected(&mut guard, device).await?;

        if let Err(e) = guard.disable_device().await {
            log::warn!("disable_device failed for '{device}' before write: {e}");
        }

        let result = op(guard.as_ref()).await;

        if let Err(e) = guard.enable_device().await {
            log::warn!("enable_device failed for '{device}' after write: {e}");
        }

        result
    }

    /// Writes that bypass the disable/enable guard entirely (`restart`).
    pub async fn write_unguarded<T, F>(&self, device: &str, op: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a dyn DeviceProtocol) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
    {
        let mut guard = self.client.lock().await;
        Self::ensure_connected(&mut guard, device).await?;
        op(guard.as_ref()).await
    }

    pub async fn ping(&self) -> bool {
        let guard = self.client.lock().await;
        guard.ping().await
    }
}

/// Registry of configured devices, keyed by the short device identifier
/// used throughout the HTTP/CLI surface.
pub struct DevicePool {
    configs: HashMap<String, DeviceConfig>,
    slots: DashMap<String, Arc<ClientSlot>>,
    factory: ClientFactory,
}

impl DevicePool {
    pub fn new(configs: HashMap<String, DeviceConfig>, factory: ClientFactory) -> Self {
        Self {
            configs,
            slots: DashMap::new(),
            factory,
        }
    }

    pub fn device_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.configs.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn get_config(&self, key: &str) -> Result<&DeviceConfig> {
        self.configs
            .get(key)
            .ok_or_else(|| FingerprintError::UnknownDevice(self.describe_unknown(key)))
    }

    pub fn list_devices(&self) -> Vec<&DeviceConfig> {
        self.configs.values().collect()
    }

    fn describe_unknown(&self, key: &str) -> String {
        let available = self.device_keys().join(", ");
        format!("{key}. Available: {available}")
    }

    /// Fetch (creating on first use) the slot for a device, lazily
    /// instantiating a not-yet-connected protocol client via `factory`.
    pub fn get_slot(&self, key: &str) -> Result<Arc<ClientSlot>> {
        if let Some(slot) = self.slots.get(key) {
            return Ok(slot.clone());
        }
        let config = self
            .configs
            .get(key)
            .ok_or_else(|| FingerprintError::UnknownDevice(self.describe_unknown(key)))?
            .clone();
        let client = (self.factory)(&config);
        let slot = Arc::new(ClientSlot::new(config, client));
        self.slots.insert(key.to_string(), slot.clone());
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MockProtocolClient;

    fn test_pool() -> DevicePool {
        let mut configs = HashMap::new();
        configs.insert(
            "main_gate".to_string(),
            DeviceConfig {
                name: "Main Gate".to_string(),
                ip: "10.0.0.5".to_string(),
                port: 4370,
                password: 0,
                model: "".to_string(),
                serial: "".to_string(),
            },
        );
        DevicePool::new(
            configs,
            Arc::new(|_cfg| Box::new(MockProtocolClient::new())),
        )
    }

    #[test]
    fn unknown_device_error_lists_available_keys() {
        let pool = test_pool();
        let err = pool.get_config("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nope"));
        assert!(msg.contains("main_gate"));
    }

    #[tokio::test]
    async fn get_slot_lazily_connects_on_first_read() {
        let pool = test_pool();
        let slot = pool.get_slot("main_gate").unwrap();
        assert!(!slot.ping().await);
        let users = slot
            .read("main_gate", |c| Box::pin(async move { c.get_users().await }))
            .await
            .unwrap();
        assert!(users.is_empty());
        assert!(slot.ping().await);
    }

    #[tokio::test]
    async fn write_guard_runs_disable_then_enable_around_op() {
        let pool = test_pool();
        let slot = pool.get_slot("main_gate").unwrap();
        slot.write("main_gate", |c| {
            Box::pin(async move {
                c.set_user(&crate::protocol::User {
                    uid: 1,
                    user_id: "E1".to_string(),
                    name: "Ada".to_string(),
                    privilege: 0,
                    password: "".to_string(),
                    group_id: "0".to_string(),
                    card: 0,
                })
                .await
            })
        })
        .await
        .unwrap();
        let users = slot
            .read("main_gate", |c| Box::pin(async move { c.get_users().await }))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "E1");
    }
}
