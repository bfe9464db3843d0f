use crate::domain::models::notification::{Channel, Notification};
use crate::domain::ports::NotificationGateway;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info};

pub struct HttpNotificationGateway {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpNotificationGateway {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalWithMsg(format!("Cannot build notification client: {}", e)))?;
        Ok(Self { client, api_url, api_key })
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    recipient: &'a str,
    channel: &'a str,
    template: &'a str,
    fields: &'a BTreeMap<String, String>,
    idempotency_key: &'a str,
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        let channel = match notification.channel {
            Channel::Sms => "sms",
            Channel::Email => "email",
        };
        let payload = NotificationPayload {
            recipient: &notification.recipient,
            channel,
            template: &notification.template,
            fields: &notification.fields,
            idempotency_key: &notification.idempotency_key,
        };

        let res = self.client.post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Idempotency-Key", &notification.idempotency_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Notification service connection error: {}", e);
                error!("{}", msg);
                AppError::Upstream(msg)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let msg = format!("Notification service failed. Status: {}, Body: {}", status, text);
            error!("{}", msg);
            return Err(AppError::Upstream(msg));
        }

        info!("Sent {} via {} for booking {}", notification.template, channel, notification.booking_id);
        Ok(())
    }
}

/// Used when no notification service is configured.
pub struct LogOnlyNotificationGateway;

#[async_trait]
impl NotificationGateway for LogOnlyNotificationGateway {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        info!("Notification service not configured; would send {} to {}", notification.template, notification.recipient);
        Ok(())
    }
}
