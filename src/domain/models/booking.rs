use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::lock::SlotKey;
use crate::domain::models::zone::ServiceZone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingTenant,
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingTenant => "pending_tenant",
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::PendingTenant => "awaiting a time",
            BookingStatus::Scheduled => "already scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "marked as missed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_tenant" => Ok(BookingStatus::PendingTenant),
            "scheduled" => Ok(BookingStatus::Scheduled),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "no_show" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Inspection contract frequency, as labelled on the source invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionFrequency {
    OneTime,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl InspectionFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionFrequency::OneTime => "one_time",
            InspectionFrequency::Monthly => "monthly",
            InspectionFrequency::Quarterly => "quarterly",
            InspectionFrequency::SemiAnnual => "semi_annual",
            InspectionFrequency::Annual => "annual",
        }
    }

    /// Interval to the next occurrence, `None` for one-time contracts.
    pub fn interval_months(&self) -> Option<u32> {
        match self {
            InspectionFrequency::OneTime => None,
            InspectionFrequency::Monthly => Some(1),
            InspectionFrequency::Quarterly => Some(3),
            InspectionFrequency::SemiAnnual => Some(6),
            InspectionFrequency::Annual => Some(12),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.interval_months().is_some()
    }
}

impl FromStr for InspectionFrequency {
    type Err = String;

    /// Accepts the loose labels invoices tend to carry ("Semi-Annual", "yearly", "once").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.trim().to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "one_time" | "onetime" | "once" | "single" => Ok(InspectionFrequency::OneTime),
            "monthly" => Ok(InspectionFrequency::Monthly),
            "quarterly" => Ok(InspectionFrequency::Quarterly),
            "semi_annual" | "semiannual" | "biannual" | "bi_annual" => Ok(InspectionFrequency::SemiAnnual),
            "annual" | "annually" | "yearly" => Ok(InspectionFrequency::Annual),
            other => Err(format!("unknown inspection frequency '{}'", other)),
        }
    }
}

impl TryFrom<String> for InspectionFrequency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub invoice_id: String,
    pub line_item_index: i32,
    pub property_address: String,
    pub postal_code: Option<String>,
    #[sqlx(try_from = "String")]
    pub zone: ServiceZone,
    pub unit_count: i32,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub tenant_email: Option<String>,
    pub landlord_name: String,
    pub landlord_email: String,
    #[sqlx(try_from = "String")]
    pub frequency: InspectionFrequency,
    pub access_token: String,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub duration_min: Option<i32>,
    pub reschedule_count: i32,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub calendar_event_id: Option<String>,
    pub parent_booking_id: Option<String>,
    pub due_on: Option<NaiveDate>,
    pub confirmation_sent_at: Option<DateTime<Utc>>,
    pub reschedule_sent_at: Option<DateTime<Utc>>,
    pub cancellation_sent_at: Option<DateTime<Utc>>,
    pub completion_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewBookingParams {
    pub invoice_id: String,
    pub line_item_index: i32,
    pub property_address: String,
    pub postal_code: Option<String>,
    pub zone: ServiceZone,
    pub unit_count: i32,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub tenant_email: Option<String>,
    pub landlord_name: String,
    pub landlord_email: String,
    pub frequency: InspectionFrequency,
}

pub fn generate_access_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

impl Booking {
    pub fn new(params: NewBookingParams) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            invoice_id: params.invoice_id,
            line_item_index: params.line_item_index,
            property_address: params.property_address,
            postal_code: params.postal_code,
            zone: params.zone,
            unit_count: params.unit_count.max(1),
            tenant_name: params.tenant_name,
            tenant_phone: params.tenant_phone,
            tenant_email: params.tenant_email,
            landlord_name: params.landlord_name,
            landlord_email: params.landlord_email,
            frequency: params.frequency,
            access_token: generate_access_token(),
            scheduled_date: None,
            scheduled_time: None,
            duration_min: None,
            reschedule_count: 0,
            status: BookingStatus::PendingTenant,
            calendar_event_id: None,
            parent_booking_id: None,
            due_on: None,
            confirmation_sent_at: None,
            reschedule_sent_at: None,
            cancellation_sent_at: None,
            completion_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_multi_unit(&self) -> bool {
        self.unit_count > 1
    }

    /// Lock key of the slot this booking currently holds.
    pub fn slot_key(&self) -> Option<SlotKey> {
        match (self.scheduled_date, self.scheduled_time) {
            (Some(date), Some(time)) => Some(SlotKey::slot(date, time)),
            _ => None,
        }
    }

    pub fn starts_at(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        let date = self.scheduled_date?;
        let time = self.scheduled_time?;
        tz.from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn ends_at_local(&self) -> Option<NaiveTime> {
        let time = self.scheduled_time?;
        let minutes = self.duration_min?;
        Some(time + Duration::minutes(minutes as i64))
    }

    /// Fresh pending booking for the next occurrence of a recurring contract.
    pub fn next_occurrence(&self, completed_on: NaiveDate) -> Option<Booking> {
        let months = self.frequency.interval_months()?;
        let now = Utc::now();

        Some(Booking {
            id: Uuid::new_v4().to_string(),
            access_token: generate_access_token(),
            scheduled_date: None,
            scheduled_time: None,
            duration_min: None,
            reschedule_count: 0,
            status: BookingStatus::PendingTenant,
            calendar_event_id: None,
            parent_booking_id: Some(self.id.clone()),
            due_on: completed_on.checked_add_months(Months::new(months)),
            confirmation_sent_at: None,
            reschedule_sent_at: None,
            cancellation_sent_at: None,
            completion_sent_at: None,
            created_at: now,
            updated_at: now,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frequency: InspectionFrequency) -> Booking {
        Booking::new(NewBookingParams {
            invoice_id: "inv-1".into(),
            line_item_index: 0,
            property_address: "12 Elm St, Springfield 94110".into(),
            postal_code: Some("94110".into()),
            zone: ServiceZone::A,
            unit_count: 1,
            tenant_name: "Tess".into(),
            tenant_phone: "+15550100".into(),
            tenant_email: None,
            landlord_name: "Lou".into(),
            landlord_email: "lou@example.com".into(),
            frequency,
        })
    }

    #[test]
    fn test_frequency_labels() {
        assert_eq!("Semi-Annual".parse::<InspectionFrequency>().unwrap(), InspectionFrequency::SemiAnnual);
        assert_eq!("yearly".parse::<InspectionFrequency>().unwrap(), InspectionFrequency::Annual);
        assert_eq!("One Time".parse::<InspectionFrequency>().unwrap(), InspectionFrequency::OneTime);
        assert!("fortnightly".parse::<InspectionFrequency>().is_err());
    }

    #[test]
    fn test_next_occurrence_for_quarterly_contract() {
        let mut current = sample(InspectionFrequency::Quarterly);
        current.status = BookingStatus::Completed;
        current.scheduled_date = NaiveDate::from_ymd_opt(2030, 1, 15);
        current.scheduled_time = NaiveTime::from_hms_opt(10, 0, 0);
        current.reschedule_count = 2;

        let next = current.next_occurrence(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()).unwrap();
        assert_eq!(next.status, BookingStatus::PendingTenant);
        assert_ne!(next.id, current.id);
        assert_ne!(next.access_token, current.access_token);
        assert!(next.scheduled_date.is_none() && next.scheduled_time.is_none());
        assert_eq!(next.reschedule_count, 0);
        assert_eq!(next.parent_booking_id.as_deref(), Some(current.id.as_str()));
        assert_eq!(next.due_on, NaiveDate::from_ymd_opt(2030, 4, 15));
        assert_eq!(next.property_address, current.property_address);
    }

    #[test]
    fn test_one_time_contract_has_no_next_occurrence() {
        let current = sample(InspectionFrequency::OneTime);
        assert!(current.next_occurrence(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()).is_none());
    }
}
