use crate::domain::models::notification::CalendarAppointment;
use crate::domain::ports::CalendarMirror;
use crate::domain::services::calendar::generate_ics;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

/// Pushes iCalendar documents to an external calendar service.
pub struct HttpCalendarMirror {
    client: Client,
    base_url: String,
}

impl HttpCalendarMirror {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalWithMsg(format!("Cannot build calendar client: {}", e)))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[derive(Deserialize)]
struct EventCreated {
    id: String,
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, AppError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    let msg = format!("Calendar service failed. Status: {}, Body: {}", status, text);
    error!("{}", msg);
    Err(AppError::Upstream(msg))
}

#[async_trait]
impl CalendarMirror for HttpCalendarMirror {
    async fn upsert(&self, event_id: Option<&str>, appointment: &CalendarAppointment) -> Result<String, AppError> {
        let ics = generate_ics(appointment);
        let request = match event_id {
            Some(id) => self.client.put(format!("{}/events/{}", self.base_url, id)),
            None => self.client.post(format!("{}/events", self.base_url)),
        };

        let res = request
            .header("Content-Type", "text/calendar; charset=utf-8")
            .body(ics)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Calendar service connection error: {}", e)))?;
        let res = check(res).await?;

        match event_id {
            Some(id) => Ok(id.to_string()),
            None => {
                let created: EventCreated = res.json().await
                    .map_err(|e| AppError::Upstream(format!("Calendar service returned an invalid body: {}", e)))?;
                info!("Calendar event {} created for booking {}", created.id, appointment.booking_id);
                Ok(created.id)
            }
        }
    }

    async fn remove(&self, event_id: &str) -> Result<(), AppError> {
        let res = self.client.delete(format!("{}/events/{}", self.base_url, event_id))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Calendar service connection error: {}", e)))?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(res).await?;
        Ok(())
    }
}

/// Used when no calendar service is configured.
pub struct NoopCalendarMirror;

#[async_trait]
impl CalendarMirror for NoopCalendarMirror {
    async fn upsert(&self, event_id: Option<&str>, appointment: &CalendarAppointment) -> Result<String, AppError> {
        Ok(event_id.map(str::to_string).unwrap_or_else(|| format!("local-{}", appointment.booking_id)))
    }

    async fn remove(&self, _event_id: &str) -> Result<(), AppError> {
        Ok(())
    }
}
