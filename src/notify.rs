//! Best-effort webhook notifications (Telegram, Mattermost). Failures are
//! logged and swallowed: a notification outage must never fail the
//! operation it is reporting on.

use crate::config::Settings;

const SERVICE_NAME: &str = "FINGERPRINT-SVC";

async fn send_telegram_message(settings: &Settings, text: &str) {
    let (Some(token), Some(chat_id)) = (&settings.telegram_bot_token, &settings.telegram_chat_id)
    else {
        return;
    };
    let url = format!("https://api.telegram.org/bot{token}/sendMessage");
    let result = reqwest::Client::new()
        .post(&url)
        .timeout(std::time::Duration::from_secs(10))
        .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
        .send()
        .await;
    if let Err(e) = result {
        log::warn!("telegram notification failed: {e}");
    }
}

async fn send_mattermost_message(settings: &Settings, text: &str) {
    let Some(webhook_url) = &settings.mattermost_webhook_url else {
        return;
    };
    let result = reqwest::Client::new()
        .post(webhook_url)
        .timeout(std::time::Duration::from_secs(10))
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await;
    if let Err(e) = result {
        log::warn!("mattermost notification failed: {e}");
    }
}

pub async fn notify_backup_success(
    settings: &Settings,
    device_key: &str,
    device_name: &str,
    user_count: usize,
    fingerprint_count: usize,
) {
    let text = format!(
        "[{SERVICE_NAME}] Backup complete for {device_name} ({device_key}): {user_count} users, {fingerprint_count} fingerprints"
    );
    send_telegram_message(settings, &text).await;
    send_mattermost_message(settings, &text).await;
}

pub async fn notify_error(settings: &Settings, operation: &str, error: &str) {
    let text = format!("[{SERVICE_NAME}] {operation} failed: {error}");
    send_telegram_message(settings, &text).await;
    send_mattermost_message(settings, &text).await;
}
