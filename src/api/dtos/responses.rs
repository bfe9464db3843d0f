use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};

use crate::domain::models::booking::{Booking, BookingStatus};
use crate::domain::models::zone::ServiceZone;
use crate::domain::services::booking_machine::MAX_RESCHEDULES;

fn hhmm<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.collect_str(&t.format("%H:%M")),
        None => serializer.serialize_none(),
    }
}

/// What a tenant sees about their booking; no invoice or landlord data.
#[derive(Serialize)]
pub struct BookingSummary {
    pub status: BookingStatus,
    pub property_address: String,
    pub zone: ServiceZone,
    pub zone_name: String,
    pub tenant_name: String,
    pub scheduled_date: Option<NaiveDate>,
    #[serde(serialize_with = "hhmm")]
    pub scheduled_time: Option<NaiveTime>,
    pub duration_min: Option<i32>,
    pub reschedules_left: i32,
    pub due_on: Option<NaiveDate>,
}

impl BookingSummary {
    pub fn new(booking: &Booking, zone_name: String) -> Self {
        Self {
            status: booking.status,
            property_address: booking.property_address.clone(),
            zone: booking.zone,
            zone_name,
            tenant_name: booking.tenant_name.clone(),
            scheduled_date: booking.scheduled_date,
            scheduled_time: booking.scheduled_time,
            duration_min: booking.duration_min,
            reschedules_left: (MAX_RESCHEDULES - booking.reschedule_count).max(0),
            due_on: booking.due_on,
        }
    }
}

#[derive(Serialize)]
pub struct ConfirmationResponse {
    pub booking: BookingSummary,
    pub message: String,
}

#[derive(Serialize)]
pub struct CreatedBookingResponse {
    pub booking: Booking,
    pub booking_link: String,
}
