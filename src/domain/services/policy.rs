use chrono::Weekday;

use crate::domain::models::booking::Booking;
use crate::domain::models::schedule::{AvailabilitySchedule, Weekly, ZoneSelector};
use crate::domain::models::zone::ServiceZone;

/// Daily ceiling for a day that already holds `existing`.
///
/// The result is the largest applicable cap: the base cap, the weekend cap on
/// Saturday/Sunday, and the multi-unit cap when strictly more than half of the
/// day's committed bookings are multi-unit properties.
pub fn max_bookings_for_day(existing: &[Booking], schedule: &AvailabilitySchedule, weekday: Weekday) -> u32 {
    let mut cap = schedule.daily_capacity;

    if matches!(weekday, Weekday::Sat | Weekday::Sun)
        && let Some(weekend) = schedule.weekend_capacity {
        cap = cap.max(weekend);
    }

    if let Some(multi_unit) = schedule.multi_unit_capacity {
        let multi = existing.iter().filter(|b| b.is_multi_unit()).count();
        if !existing.is_empty() && multi * 2 > existing.len() {
            cap = cap.max(multi_unit);
        }
    }

    cap
}

pub fn is_day_full(existing: &[Booking], schedule: &AvailabilitySchedule, weekday: Weekday) -> bool {
    existing.len() as u32 >= max_bookings_for_day(existing, schedule, weekday)
}

pub fn is_zone_allowed_on_day(zone: ServiceZone, weekday: Weekday, restrictions: &Weekly<Vec<ZoneSelector>>) -> bool {
    match restrictions.get(weekday) {
        None => true,
        Some(allowed) => allowed.iter().any(|s| match s {
            ZoneSelector::All => true,
            ZoneSelector::Zone(z) => *z == zone,
        }),
    }
}
