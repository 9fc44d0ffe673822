//! HRIS employee roster client.
//!
//! A plain authenticated REST GET against whatever HRIS the deployment
//! points it at, returning the minimal `{identification_id, name}` shape
//! `user_sync` needs to reconcile enrolled device users. This replaces
//! the Odoo-specific JSON-RPC client the source implementation used: the
//! spec's integration boundary is "HRIS", not any particular ERP, and a
//! plain REST client is the idiomatic shape when the concrete vendor
//! isn't fixed.

use serde::Deserialize;

use crate::config::Settings;
use crate::error::{FingerprintError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct HrisEmployee {
    pub identification_id: String,
    pub name: String,
}

pub struct HrisClient {
    http: reqwest::Client,
    base_url: String,
    employees_path: String,
    api_key: Option<String>,
}

impl HrisClient {
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let base_url = settings.hris_base_url.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            base_url,
            employees_path: settings.hris_employees_path.clone(),
            api_key: settings.hris_api_key.clone(),
        })
    }

    /// Fetch the full employee roster filtered to identified employees,
    /// mirroring the source's `hr.employee` query filtered to
    /// `identification_id != False`.
    pub async fn fetch_employees(&self) -> Result<Vec<HrisEmployee>> {
        let url = format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.employees_path
        );
        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(FingerprintError::PeripheralFailure(
                "hris".to_string(),
                format!("unexpected status {}", resp.status()),
            ));
        }
        let employees: Vec<HrisEmployee> = resp.json().await?;
        Ok(employees
            .into_iter()
            .filter(|e| !e.identification_id.trim().is_empty())
            .collect())
    }
}
