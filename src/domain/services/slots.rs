use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::collections::HashMap;

use crate::domain::models::booking::Booking;
use crate::domain::models::schedule::{AvailabilitySchedule, ParsedWindow};
use crate::domain::models::slot::{DateAvailability, DateReason, SlotReason, TimeSlot};
use crate::domain::models::zone::ServiceZone;
use crate::domain::services::policy::{is_day_full, is_zone_allowed_on_day};
use crate::domain::services::zones::TravelMatrix;
use crate::error::AppError;

fn minute_of_day(time: NaiveTime) -> i64 {
    (time.num_seconds_from_midnight() / 60) as i64
}

fn time_of_minute(minute: i64) -> Option<NaiveTime> {
    if !(0..1440).contains(&minute) {
        return None;
    }
    NaiveTime::from_hms_opt((minute / 60) as u32, (minute % 60) as u32, 0)
}

/// One appointment on a day, in minutes from midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub start: i64,
    pub end: i64,
    pub zone: ServiceZone,
}

impl Visit {
    pub fn new(start: NaiveTime, duration: Duration, zone: ServiceZone) -> Self {
        let start = minute_of_day(start);
        Self { start, end: start + duration.num_minutes(), zone }
    }

    pub fn from_booking(booking: &Booking) -> Option<Self> {
        let start = booking.scheduled_time?;
        let minutes = booking.duration_min?;
        Some(Self::new(start, Duration::minutes(minutes as i64), booking.zone))
    }

    fn overlaps(&self, other: &Visit) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the inspector can travel between the two visits in either order.
    fn clears_travel(&self, other: &Visit, matrix: &TravelMatrix, buffer_min: u32) -> bool {
        let to_other = matrix.travel_time(self.zone, other.zone) as i64 + buffer_min as i64;
        let from_other = matrix.travel_time(other.zone, self.zone) as i64 + buffer_min as i64;

        let fits_before = self.end + to_other <= other.start;
        let fits_after = other.end + from_other <= self.start;
        fits_before || fits_after
    }
}

/// Direct overlap against any visit wins over a travel-buffer violation against any visit.
pub fn check_visit(candidate: &Visit, existing: &[Visit], matrix: &TravelMatrix, buffer_min: u32) -> Option<SlotReason> {
    if existing.iter().any(|v| candidate.overlaps(v)) {
        return Some(SlotReason::Overlap);
    }
    if existing.iter().any(|v| !candidate.clears_travel(v, matrix, buffer_min)) {
        return Some(SlotReason::TravelBuffer);
    }
    None
}

/// Start times the window can hold, without partial trailing slots.
pub fn slot_starts(window: &ParsedWindow) -> Vec<NaiveTime> {
    let step = window.slot_duration.num_minutes();
    let close = minute_of_day(window.close);
    let mut cursor = minute_of_day(window.open);
    let mut starts = Vec::new();

    while step > 0 && cursor + step <= close {
        if let Some(time) = time_of_minute(cursor) {
            starts.push(time);
        }
        cursor += step;
    }
    starts
}

/// Everything a scheduling decision for one property on one date depends on.
pub struct DayContext<'a> {
    pub schedule: &'a AvailabilitySchedule,
    pub matrix: &'a TravelMatrix,
    pub date: NaiveDate,
    pub zone: ServiceZone,
    /// Committed bookings that day, excluding the booking being scheduled.
    pub committed: &'a [Booking],
    pub now: DateTime<Utc>,
}

impl DayContext<'_> {
    fn day_reason(&self) -> Result<Option<SlotReason>, AppError> {
        let tz = self.schedule.tz()?;
        let today = self.now.with_timezone(&tz).date_naive();
        let last_day = self.schedule.last_bookable_day(today);
        let weekday = self.date.weekday();

        if self.schedule.is_blocked(self.date) {
            return Ok(Some(SlotReason::BlockedDate));
        }
        if self.date < today || self.date > last_day {
            return Ok(Some(SlotReason::OutsideBookingWindow));
        }
        if !is_zone_allowed_on_day(self.zone, weekday, &self.schedule.zone_restrictions) {
            return Ok(Some(SlotReason::ZoneRestricted));
        }
        if is_day_full(self.committed, self.schedule, weekday) {
            return Ok(Some(SlotReason::DayFull));
        }
        Ok(None)
    }

    fn visits(&self) -> Vec<Visit> {
        self.committed.iter().filter_map(Visit::from_booking).collect()
    }

    fn within_notice(&self, start: NaiveTime) -> Result<bool, AppError> {
        let tz = self.schedule.tz()?;
        let cutoff = self.now.checked_add_signed(self.schedule.min_notice()).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(match tz.from_local_datetime(&self.date.and_time(start)).earliest() {
            Some(local) => local.with_timezone(&Utc) < cutoff,
            // Skipped by a DST change: never bookable.
            None => true,
        })
    }

    /// Zone of the strict majority of the day's bookings, if there is one.
    fn majority_zone(&self) -> Option<ServiceZone> {
        let mut counts: HashMap<ServiceZone, usize> = HashMap::new();
        for booking in self.committed {
            *counts.entry(booking.zone).or_default() += 1;
        }
        let total = self.committed.len();
        counts.into_iter()
            .find(|(_, count)| count * 2 > total)
            .map(|(zone, _)| zone)
    }

    /// Availability of a single candidate start. Used for listing and for the final
    /// check before commit, so both see the same answer.
    pub fn evaluate_candidate(&self, start: NaiveTime, duration: Duration) -> Result<Option<SlotReason>, AppError> {
        if let Some(reason) = self.day_reason()? {
            return Ok(Some(reason));
        }
        self.evaluate_within_day(start, duration, &self.visits())
    }

    fn evaluate_within_day(&self, start: NaiveTime, duration: Duration, visits: &[Visit]) -> Result<Option<SlotReason>, AppError> {
        if self.within_notice(start)? {
            return Ok(Some(SlotReason::MinNotice));
        }
        let candidate = Visit::new(start, duration, self.zone);
        Ok(check_visit(&candidate, visits, self.matrix, self.schedule.travel_buffer_min))
    }

    pub fn generate_slots(&self) -> Result<Vec<TimeSlot>, AppError> {
        let Some(window) = self.schedule.window_for(self.date)? else {
            return Ok(Vec::new());
        };

        let day_reason = self.day_reason()?;
        let visits = self.visits();
        let majority = self.majority_zone();
        let mut slots = Vec::new();

        for start in slot_starts(&window) {
            let reason = match day_reason {
                Some(reason) => Some(reason),
                None => self.evaluate_within_day(start, window.slot_duration, &visits)?,
            };
            let available = reason.is_none();
            slots.push(TimeSlot {
                date: self.date,
                start,
                end: start + window.slot_duration,
                available,
                reason,
                preferred: available && majority == Some(self.zone),
            });
        }
        Ok(slots)
    }

    pub fn date_availability(&self) -> Result<DateAvailability, AppError> {
        let unavailable = |reason| DateAvailability { date: self.date, available: false, reason: Some(reason) };

        if self.schedule.window_for(self.date)?.is_none() {
            return Ok(unavailable(DateReason::Closed));
        }
        match self.day_reason()? {
            Some(SlotReason::BlockedDate) => return Ok(unavailable(DateReason::BlockedDate)),
            Some(SlotReason::OutsideBookingWindow) => return Ok(unavailable(DateReason::OutsideBookingWindow)),
            Some(SlotReason::ZoneRestricted) => return Ok(unavailable(DateReason::ZoneRestricted)),
            Some(SlotReason::DayFull) => return Ok(unavailable(DateReason::DayFull)),
            _ => {}
        }

        if self.generate_slots()?.iter().any(|s| s.available) {
            Ok(DateAvailability { date: self.date, available: true, reason: None })
        } else {
            Ok(unavailable(DateReason::NoOpenSlots))
        }
    }
}
