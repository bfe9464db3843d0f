use std::collections::BTreeMap;

use chrono_tz::Tz;
use tera::{Context, Tera};

use crate::domain::models::booking::Booking;
use crate::domain::models::notification::{Channel, Notification, NotificationKind};
use crate::domain::services::booking_machine::MAX_RESCHEDULES;
use crate::error::AppError;

const ALL_KINDS: [NotificationKind; 5] = [
    NotificationKind::BookingLink,
    NotificationKind::Confirmation,
    NotificationKind::Reschedule,
    NotificationKind::Cancellation,
    NotificationKind::Completion,
];

fn template_source(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::BookingLink => include_str!("../../templates/inspection_booking_link.txt"),
        NotificationKind::Confirmation => include_str!("../../templates/inspection_confirmed.txt"),
        NotificationKind::Reschedule => include_str!("../../templates/inspection_rescheduled.txt"),
        NotificationKind::Cancellation => include_str!("../../templates/inspection_cancelled.txt"),
        NotificationKind::Completion => include_str!("../../templates/inspection_completed.txt"),
    }
}

pub fn load_templates() -> Result<Tera, AppError> {
    let mut tera = Tera::default();
    for kind in ALL_KINDS {
        tera.add_raw_template(kind.template(), template_source(kind))
            .map_err(|e| AppError::InternalWithMsg(format!("Tera parse error in {}: {:?}", kind.template(), e)))?;
    }
    Ok(tera)
}

/// Renders tenant- and landlord-facing messages for a booking.
pub struct MessageComposer {
    tera: Tera,
    frontend_url: String,
}

impl MessageComposer {
    pub fn new(tera: Tera, frontend_url: String) -> Self {
        Self { tera, frontend_url }
    }

    pub fn manage_link(&self, booking: &Booking) -> String {
        format!("{}/inspections/{}", self.frontend_url.trim_end_matches('/'), booking.access_token)
    }

    fn fields(&self, booking: &Booking, tz: &Tz) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("tenant_name".to_string(), booking.tenant_name.clone());
        fields.insert("landlord_name".to_string(), booking.landlord_name.clone());
        fields.insert("address".to_string(), booking.property_address.clone());
        fields.insert("manage_link".to_string(), self.manage_link(booking));

        if let Some(due_on) = booking.due_on {
            fields.insert("due_on".to_string(), due_on.format("%B %-d, %Y").to_string());
        }
        if let Some(starts_at) = booking.starts_at(tz) {
            let local = starts_at.with_timezone(tz);
            fields.insert("date_label".to_string(), local.format("%A, %B %-d").to_string());
            fields.insert("time_label".to_string(), local.format("%-I:%M %p").to_string());
        }
        fields
    }

    pub fn render(&self, kind: NotificationKind, booking: &Booking, tz: &Tz) -> Result<String, AppError> {
        let mut context = Context::new();
        for (key, value) in self.fields(booking, tz) {
            context.insert(key, &value);
        }
        if !context.contains_key("due_on") {
            context.insert("due_on", &false);
        }
        context.insert("reschedules_left", &(MAX_RESCHEDULES - booking.reschedule_count).max(0));
        context.insert("recurring", &booking.frequency.is_recurring());

        let body = self.tera.render(kind.template(), &context)
            .map_err(|e| AppError::InternalWithMsg(format!("Tera render error for {}: {:?}", kind.template(), e)))?;
        Ok(body.trim().to_string())
    }

    /// Every message a transition of `kind` sends, one per recipient and channel.
    pub fn compose(&self, kind: NotificationKind, booking: &Booking, tz: &Tz) -> Result<Vec<Notification>, AppError> {
        let body = self.render(kind, booking, tz)?;
        let mut fields = self.fields(booking, tz);
        fields.insert("body".to_string(), body);

        let mut out = Vec::new();
        match kind {
            NotificationKind::Completion => {
                out.push(Notification::new(&booking.id, kind, Channel::Email, &booking.landlord_email, fields));
            }
            _ => {
                out.push(Notification::new(&booking.id, kind, Channel::Sms, &booking.tenant_phone, fields.clone()));
                if let Some(email) = &booking.tenant_email {
                    out.push(Notification::new(&booking.id, kind, Channel::Email, email, fields));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::booking::{BookingStatus, InspectionFrequency, NewBookingParams};
    use crate::domain::models::zone::ServiceZone;
    use chrono::{NaiveDate, NaiveTime};

    fn composer() -> MessageComposer {
        MessageComposer::new(load_templates().unwrap(), "https://app.example.com/".into())
    }

    fn booking(email: Option<&str>) -> Booking {
        let mut b = Booking::new(NewBookingParams {
            invoice_id: "inv-3".into(),
            line_item_index: 0,
            property_address: "12 Elm St 94110".into(),
            postal_code: Some("94110".into()),
            zone: ServiceZone::A,
            unit_count: 1,
            tenant_name: "Tess".into(),
            tenant_phone: "+15550100".into(),
            tenant_email: email.map(str::to_string),
            landlord_name: "Lou".into(),
            landlord_email: "lou@example.com".into(),
            frequency: InspectionFrequency::Quarterly,
        });
        b.status = BookingStatus::Scheduled;
        b.scheduled_date = NaiveDate::from_ymd_opt(2030, 3, 6);
        b.scheduled_time = NaiveTime::from_hms_opt(14, 0, 0);
        b.duration_min = Some(60);
        b
    }

    #[test]
    fn test_confirmation_body() {
        let body = composer().render(NotificationKind::Confirmation, &booking(None), &chrono_tz::UTC).unwrap();
        assert!(body.contains("Wednesday, March 6"));
        assert!(body.contains("2:00 PM"));
        assert!(body.contains("https://app.example.com/inspections/"));
    }

    #[test]
    fn test_reschedule_body_counts_down() {
        let mut b = booking(None);
        b.reschedule_count = 1;
        let body = composer().render(NotificationKind::Reschedule, &b, &chrono_tz::UTC).unwrap();
        assert!(body.contains("1 more time:"));

        b.reschedule_count = 2;
        let body = composer().render(NotificationKind::Reschedule, &b, &chrono_tz::UTC).unwrap();
        assert!(body.contains("can no longer be changed"));
    }

    #[test]
    fn test_recipients_per_kind() {
        let c = composer();
        let sms_only = c.compose(NotificationKind::Confirmation, &booking(None), &chrono_tz::UTC).unwrap();
        assert_eq!(sms_only.len(), 1);
        assert_eq!(sms_only[0].channel, Channel::Sms);

        let both = c.compose(NotificationKind::Cancellation, &booking(Some("t@example.com")), &chrono_tz::UTC).unwrap();
        assert_eq!(both.len(), 2);
        assert_ne!(both[0].idempotency_key, both[1].idempotency_key);

        let landlord = c.compose(NotificationKind::Completion, &booking(Some("t@example.com")), &chrono_tz::UTC).unwrap();
        assert_eq!(landlord.len(), 1);
        assert_eq!(landlord[0].recipient, "lou@example.com");
    }
}
