use chrono::Duration;
use chrono_tz::Tz;
use icalendar::{Calendar, Component, Event as IcalEvent, EventLike};

use crate::domain::models::booking::Booking;
use crate::domain::models::notification::CalendarAppointment;

/// Appointment for a scheduled booking, `None` while it has no time.
pub fn appointment_for(booking: &Booking, tz: &Tz, zone_name: &str) -> Option<CalendarAppointment> {
    let starts_at = booking.starts_at(tz)?;
    let ends_at = starts_at + Duration::minutes(booking.duration_min? as i64);

    Some(CalendarAppointment {
        booking_id: booking.id.clone(),
        summary: format!("Inspection: {}", booking.property_address),
        description: format!(
            "Tenant: {} ({})\nLandlord: {}\nZone: {}\nUnits: {}",
            booking.tenant_name, booking.tenant_phone, booking.landlord_name, zone_name, booking.unit_count
        ),
        location: booking.property_address.clone(),
        starts_at,
        ends_at,
    })
}

/// Generates an iCalendar (.ics) document for an appointment
pub fn generate_ics(appointment: &CalendarAppointment) -> String {
    let mut calendar = Calendar::new();

    let ical_event = IcalEvent::new()
        .summary(&appointment.summary)
        .description(&appointment.description)
        .location(&appointment.location)
        .starts(appointment.starts_at)
        .ends(appointment.ends_at)
        .uid(&appointment.booking_id)
        .done();

    calendar.push(ical_event);
    calendar.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::booking::{InspectionFrequency, NewBookingParams};
    use crate::domain::models::zone::ServiceZone;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_ics_for_scheduled_booking() {
        let mut booking = Booking::new(NewBookingParams {
            invoice_id: "inv".into(),
            line_item_index: 0,
            property_address: "7 Bay Rd 94501".into(),
            postal_code: Some("94501".into()),
            zone: ServiceZone::D,
            unit_count: 3,
            tenant_name: "Ti".into(),
            tenant_phone: "+1555".into(),
            tenant_email: None,
            landlord_name: "La".into(),
            landlord_email: "la@example.com".into(),
            frequency: InspectionFrequency::OneTime,
        });
        assert!(appointment_for(&booking, &chrono_tz::UTC, "East Bay").is_none());

        booking.scheduled_date = NaiveDate::from_ymd_opt(2030, 3, 6);
        booking.scheduled_time = NaiveTime::from_hms_opt(9, 0, 0);
        booking.duration_min = Some(90);
        let appointment = appointment_for(&booking, &chrono_tz::UTC, "East Bay").unwrap();
        assert_eq!((appointment.ends_at - appointment.starts_at).num_minutes(), 90);

        let ics = generate_ics(&appointment);
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains(&booking.id));
        assert!(ics.contains("Inspection: 7 Bay Rd 94501"));
    }
}
