use serde::Serialize;

use crate::config::config;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("email transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email rejected: {0}")]
    Rejected(String),
}

#[derive(Serialize)]
struct ResendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    text: String,
}

/// Send one plain-text message to the configured recipient using the
/// Resend API. Notification is decoupled from ingestion: a failure here is
/// for the caller to log, never to roll back or retry persisted readings.
pub async fn send(subject: &str, body: &str) -> Result<(), NotificationError> {
    let cfg = config();

    // In dev mode without API key, just log the report
    if cfg.resend_api_key.is_empty() {
        log::info!("DEV MODE: email '{}' to {}:\n{}", subject, cfg.email_to, body);
        return Ok(());
    }

    let request = ResendEmailRequest {
        from: cfg.email_from.clone(),
        to: vec![cfg.email_to.clone()],
        subject: subject.to_string(),
        text: body.to_string(),
    };

    let response = reqwest::Client::new()
        .post("https://api.resend.com/emails")
        .header("Authorization", format!("Bearer {}", cfg.resend_api_key))
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(NotificationError::Rejected(error_text));
    }

    log::info!("Weather report sent to {}", cfg.email_to);
    Ok(())
}
