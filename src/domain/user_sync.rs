//! User (enrolled employee) CRUD and HRIS-driven synchronization.

use serde::Serialize;

use crate::error::{FingerprintError, Result};
use crate::hris::HrisEmployee;
use crate::pool::DevicePool;
use crate::protocol::User;

pub async fn get_users(pool: &DevicePool, device_key: &str) -> Result<Vec<User>> {
    let slot = pool.get_slot(device_key)?;
    let mut users = slot
        .read(device_key, |c| Box::pin(async move { c.get_users().await }))
        .await?;
    users.sort_by_key(|u| u.uid);
    Ok(users)
}

pub async fn get_user(pool: &DevicePool, device_key: &str, user_id: &str) -> Result<User> {
    get_users(pool, device_key)
        .await?
        .into_iter()
        .find(|u| u.user_id == user_id)
        .ok_or_else(|| FingerprintError::UnknownUser(user_id.to_string(), device_key.to_string()))
}

pub async fn add_user(pool: &DevicePool, device_key: &str, user: User) -> Result<()> {
    let slot = pool.get_slot(device_key)?;
    slot.write(device_key, |c| Box::pin(async move { c.set_user(&user).await }))
        .await
}

/// Update an enrolled user, preserving any field left as `None` by the
/// caller. Fails with `UnknownUser` if `uid` isn't present on the device.
pub struct UserUpdate {
    pub name: Option<String>,
    pub privilege: Option<u32>,
    pub password: Option<String>,
    pub group_id: Option<String>,
    pub card: Option<u64>,
}

pub async fn update_user(
    pool: &DevicePool,
    device_key: &str,
    uid: u32,
    update: UserUpdate,
) -> Result<User> {
    let existing = get_users(pool, device_key)
        .await?
        .into_iter()
        .find(|u| u.uid == uid)
        .ok_or_else(|| {
            FingerprintError::UnknownUser(format!("uid={uid}"), device_key.to_string())
        })?;

    let merged = User {
        uid,
        user_id: existing.user_id,
        name: update.name.unwrap_or(existing.name),
        privilege: update.privilege.unwrap_or(existing.privilege),
        password: update.password.unwrap_or(existing.password),
        group_id: update.group_id.unwrap_or(existing.group_id),
        card: update.card.unwrap_or(existing.card),
    };

    let slot = pool.get_slot(device_key)?;
    let to_write = merged.clone();
    slot.write(device_key, |c| Box::pin(async move { c.set_user(&to_write).await }))
        .await?;
    Ok(merged)
}

pub async fn delete_user(pool: &DevicePool, device_key: &str, uid: u32) -> Result<()> {
    let slot = pool.get_slot(device_key)?;
    slot.write(device_key, |c| Box::pin(async move { c.delete_user(uid).await }))
        .await
}

#[derive(Debug, Default, Serialize)]
pub struct SyncOutcome {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub details_add: Vec<String>,
    pub details_update: Vec<String>,
    pub dry_run: bool,
}

/// Reconcile a device's enrolled users against the HRIS employee roster.
/// Employee names are truncated to 24 characters to fit the device's
/// display field. New uids are assigned starting one past the device's
/// current maximum uid, computed once before additions begin — later
/// additions in the same run take the next uid in sequence rather than
/// recomputing the device maximum each time.
pub async fn sync_from_hris(
    pool: &DevicePool,
    device_key: &str,
    employees: &[HrisEmployee],
    dry_run: bool,
) -> Result<SyncOutcome> {
    let device_users = get_users(pool, device_key).await?;
    let max_uid = device_users.iter().map(|u| u.uid).max().unwrap_or(0);

    let mut outcome = SyncOutcome {
        dry_run,
        ..Default::default()
    };
    let mut to_add: Vec<User> = Vec::new();
    let mut to_update: Vec<User> = Vec::new();

    for emp in employees {
        let eid = emp.identification_id.trim().to_string();
        let name: String = emp.name.chars().take(24).collect();

        if let Some(existing) = device_users.iter().find(|u| u.user_id == eid) {
            if existing.name != name {
                let updated = User {
                    name: name.clone(),
                    ..existing.clone()
                };
                outcome
                    .details_update
                    .push(format!("{eid}: '{}' -> '{name}'", existing.name));
                to_update.push(updated);
            } else {
                outcome.unchanged += 1;
            }
        } else {
            let new_uid = max_uid + 1 + to_add.len() as u32;
            outcome.details_add.push(format!("{eid}: '{name}' (uid={new_uid})"));
            to_add.push(User {
                uid: new_uid,
                user_id: eid,
                name,
                privilege: 0,
                password: String::new(),
                group_id: "0".to_string(),
                card: 0,
            });
        }
    }

    outcome.added = to_add.len();
    outcome.updated = to_update.len();

    if !dry_run {
        let slot = pool.get_slot(device_key)?;
        for user in to_add.into_iter().chain(to_update.into_iter()) {
            slot.write(device_key, |c| Box::pin(async move { c.set_user(&user).await }))
                .await?;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::protocol::MockProtocolClient;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn pool_with_users(users: Vec<User>) -> DevicePool {
        let mut configs = HashMap::new();
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
        let users = Arc::new(std::sync::Mutex::new(users));
        DevicePool::new(
            configs,
            Arc::new(move |_cfg| {
                let mock = MockProtocolClient::new();
                *mock.users.lock().unwrap() = users.lock().unwrap().clone();
                Box::new(mock)
            }),
        )
    }

    fn employee(id: &str, name: &str) -> HrisEmployee {
        HrisEmployee {
            identification_id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn sync_assigns_sequential_uids_for_new_employees() {
        let pool = pool_with_users(vec![User {
            uid: 5,
            user_id: "E1".to_string(),
            name: "Ada".to_string(),
            privilege: 0,
            password: String::new(),
            group_id: "0".to_string(),
            card: 0,
        }]);

        let employees = vec![employee("E1", "Ada"), employee("E2", "Grace"), employee("E3", "Linus")];
        let outcome = sync_from_hris(&pool, "main_gate", &employees, true)
            .await
            .unwrap();

        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.added, 2);
        assert!(outcome.details_add[0].contains("uid=6"));
        assert!(outcome.details_add[1].contains("uid=7"));
    }

    #[tokio::test]
    async fn sync_detects_name_change_as_update() {
        let pool = pool_with_users(vec![User {
            uid: 1,
            user_id: "E1".to_string(),
            name: "Ada".to_string(),
            privilege: 0,
            password: String::new(),
            group_id: "0".to_string(),
            card: 0,
        }]);
        let employees = vec![employee("E1", "Ada Lovelace")];
        let outcome = sync_from_hris(&pool, "main_gate", &employees, true)
            .await
            .unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.added, 0);
    }

    #[tokio::test]
    async fn dry_run_does_not_write_to_device() {
        let pool = pool_with_users(vec![]);
        let employees = vec![employee("E1", "Ada")];
        sync_from_hris(&pool, "main_gate", &employees, true)
            .await
            .unwrap();
        let users = get_users(&pool, "main_gate").await.unwrap();
        assert!(users.is_empty());
    }
}
