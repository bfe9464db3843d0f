use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Reschedule,
    Cancellation,
    Completion,
    BookingLink,
}

impl NotificationKind {
    pub fn template(&self) -> &'static str {
        match self {
            NotificationKind::Confirmation => "inspection_confirmed",
            NotificationKind::Reschedule => "inspection_rescheduled",
            NotificationKind::Cancellation => "inspection_cancelled",
            NotificationKind::Completion => "inspection_completed",
            NotificationKind::BookingLink => "inspection_booking_link",
        }
    }

    /// Booking column holding the audit timestamp, if the kind is audited.
    pub fn audit_column(&self) -> Option<&'static str> {
        match self {
            NotificationKind::Confirmation => Some("confirmation_sent_at"),
            NotificationKind::Reschedule => Some("reschedule_sent_at"),
            NotificationKind::Cancellation => Some("cancellation_sent_at"),
            NotificationKind::Completion => Some("completion_sent_at"),
            NotificationKind::BookingLink => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
}

/// A "send this" request handed to the notification gateway.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub booking_id: String,
    pub kind: NotificationKind,
    pub channel: Channel,
    pub recipient: String,
    pub template: String,
    pub fields: BTreeMap<String, String>,
    pub idempotency_key: String,
}

impl Notification {
    pub fn new(booking_id: &str, kind: NotificationKind, channel: Channel, recipient: &str, fields: BTreeMap<String, String>) -> Self {
        let template = kind.template().to_string();

        let fields_json = serde_json::to_string(&fields).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(booking_id.as_bytes());
        hasher.update(template.as_bytes());
        hasher.update(recipient.as_bytes());
        hasher.update(fields_json.as_bytes());
        let idempotency_key = hex::encode(hasher.finalize());

        Self {
            booking_id: booking_id.to_string(),
            kind,
            channel,
            recipient: recipient.to_string(),
            template,
            fields,
            idempotency_key,
        }
    }
}

/// Appointment details mirrored to the external calendar.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarAppointment {
    pub booking_id: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}
