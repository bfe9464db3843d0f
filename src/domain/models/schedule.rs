use chrono::{Datelike, Days, Duration, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::models::zone::ServiceZone;
use crate::error::AppError;

pub const MAX_ADVANCE_DAYS: u32 = 365;
pub const MAX_NOTICE_HOURS: u32 = 7 * 24;
pub const MAX_TRAVEL_BUFFER_MIN: u32 = 24 * 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
    pub slot_duration_min: u32,
}

/// A working window with its times parsed.
#[derive(Debug, Clone, Copy)]
pub struct ParsedWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_duration: Duration,
}

impl TimeWindow {
    pub fn parse(&self) -> Result<ParsedWindow, AppError> {
        let open = NaiveTime::parse_from_str(&self.start, "%H:%M")
            .map_err(|_| AppError::InternalWithMsg(format!("Invalid window start '{}'", self.start)))?;
        let close = NaiveTime::parse_from_str(&self.end, "%H:%M")
            .map_err(|_| AppError::InternalWithMsg(format!("Invalid window end '{}'", self.end)))?;
        if self.slot_duration_min == 0 {
            return Err(AppError::InternalWithMsg("Slot duration must be positive".into()));
        }
        if close <= open {
            return Err(AppError::InternalWithMsg(format!("Window {}-{} closes before it opens", self.start, self.end)));
        }
        Ok(ParsedWindow {
            open,
            close,
            slot_duration: Duration::minutes(self.slot_duration_min as i64),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Weekly<T> {
    pub monday: Option<T>,
    pub tuesday: Option<T>,
    pub wednesday: Option<T>,
    pub thursday: Option<T>,
    pub friday: Option<T>,
    pub saturday: Option<T>,
    pub sunday: Option<T>,
}

impl<T> Default for Weekly<T> {
    fn default() -> Self {
        Self {
            monday: None,
            tuesday: None,
            wednesday: None,
            thursday: None,
            friday: None,
            saturday: None,
            sunday: None,
        }
    }
}

impl<T> Weekly<T> {
    pub fn get(&self, day: Weekday) -> Option<&T> {
        match day {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }

    pub fn set(&mut self, day: Weekday, value: Option<T>) {
        let slot = match day {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        };
        *slot = value;
    }
}

/// Entry of a zone-day allow-list: a specific zone or the `ALL` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSelector {
    All,
    Zone(ServiceZone),
}

impl Serialize for ZoneSelector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ZoneSelector::All => serializer.serialize_str("ALL"),
            ZoneSelector::Zone(zone) => serializer.serialize_str(zone.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for ZoneSelector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().eq_ignore_ascii_case("ALL") {
            return Ok(ZoneSelector::All);
        }
        raw.parse::<ServiceZone>()
            .map(ZoneSelector::Zone)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapacityEnforcement {
    /// Read-then-compare; concurrent confirms on different slots may exceed the cap slightly.
    #[default]
    BestEffort,
    /// Confirmations on the same day are serialized through a per-day lock key.
    PerDayLock,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AvailabilitySchedule {
    pub version: i64,
    pub timezone: String,
    pub hours: Weekly<TimeWindow>,
    pub blocked_dates: Vec<NaiveDate>,
    pub min_notice_hours: u32,
    pub max_advance_days: u32,
    pub daily_capacity: u32,
    pub weekend_capacity: Option<u32>,
    pub multi_unit_capacity: Option<u32>,
    pub zone_restrictions: Weekly<Vec<ZoneSelector>>,
    pub travel_buffer_min: u32,
    pub capacity_enforcement: CapacityEnforcement,
}

impl Default for AvailabilitySchedule {
    fn default() -> Self {
        let weekday_window = || Some(TimeWindow {
            start: "08:00".to_string(),
            end: "17:00".to_string(),
            slot_duration_min: 60,
        });

        Self {
            version: 0,
            timezone: "UTC".to_string(),
            hours: Weekly {
                monday: weekday_window(),
                tuesday: weekday_window(),
                wednesday: weekday_window(),
                thursday: weekday_window(),
                friday: weekday_window(),
                saturday: None,
                sunday: None,
            },
            blocked_dates: Vec::new(),
            min_notice_hours: 24,
            max_advance_days: 60,
            daily_capacity: 6,
            weekend_capacity: None,
            multi_unit_capacity: None,
            zone_restrictions: Weekly::default(),
            travel_buffer_min: 0,
            capacity_enforcement: CapacityEnforcement::BestEffort,
        }
    }
}

impl AvailabilitySchedule {
    pub fn tz(&self) -> Result<Tz, AppError> {
        self.timezone.parse::<Tz>()
            .map_err(|_| AppError::InternalWithMsg(format!("Invalid schedule timezone '{}'", self.timezone)))
    }

    /// Working window for the date's weekday, `None` when closed.
    pub fn window_for(&self, date: NaiveDate) -> Result<Option<ParsedWindow>, AppError> {
        self.hours.get(date.weekday()).map(TimeWindow::parse).transpose()
    }

    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.blocked_dates.contains(&date)
    }

    pub fn min_notice(&self) -> Duration {
        Duration::hours(self.min_notice_hours as i64)
    }

    /// Last date of the advance window that starts at `today`.
    pub fn last_bookable_day(&self, today: NaiveDate) -> NaiveDate {
        today.checked_add_days(Days::new(self.max_advance_days as u64)).unwrap_or(NaiveDate::MAX)
    }

    /// Checked on administrative update so a bad value never gets persisted.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.timezone.parse::<Tz>().is_err() {
            return Err(AppError::Validation("Invalid timezone".into()));
        }
        for day in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat, Weekday::Sun] {
            if let Some(window) = self.hours.get(day) {
                window.parse().map_err(|e| AppError::Validation(format!("{} hours: {}", day, e)))?;
            }
        }
        if self.daily_capacity == 0 {
            return Err(AppError::Validation("daily_capacity must be at least 1".into()));
        }
        if !(1..=MAX_ADVANCE_DAYS).contains(&self.max_advance_days) {
            return Err(AppError::Validation(format!("max_advance_days must be between 1 and {}", MAX_ADVANCE_DAYS)));
        }
        if self.min_notice_hours > MAX_NOTICE_HOURS {
            return Err(AppError::Validation(format!("min_notice_hours must be at most {}", MAX_NOTICE_HOURS)));
        }
        if self.travel_buffer_min > MAX_TRAVEL_BUFFER_MIN {
            return Err(AppError::Validation(format!("travel_buffer_min must be at most {}", MAX_TRAVEL_BUFFER_MIN)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_restrictions_accept_all_sentinel() {
        let json = r#"{ "tuesday": ["A"], "friday": ["all", "B"] }"#;
        let parsed: Weekly<Vec<ZoneSelector>> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.get(Weekday::Tue), Some(&vec![ZoneSelector::Zone(ServiceZone::A)]));
        assert_eq!(parsed.get(Weekday::Fri).unwrap()[0], ZoneSelector::All);
        assert!(parsed.get(Weekday::Mon).is_none());
    }

    #[test]
    fn test_validate_bounds_numeric_settings() {
        let within = AvailabilitySchedule {
            max_advance_days: MAX_ADVANCE_DAYS,
            min_notice_hours: MAX_NOTICE_HOURS,
            travel_buffer_min: MAX_TRAVEL_BUFFER_MIN,
            ..AvailabilitySchedule::default()
        };
        assert!(within.validate().is_ok());

        let oversized = [
            AvailabilitySchedule { max_advance_days: u32::MAX, ..within.clone() },
            AvailabilitySchedule { max_advance_days: 0, ..within.clone() },
            AvailabilitySchedule { min_notice_hours: MAX_NOTICE_HOURS + 1, ..within.clone() },
            AvailabilitySchedule { travel_buffer_min: u32::MAX, ..within.clone() },
        ];
        for schedule in oversized {
            assert!(matches!(schedule.validate(), Err(AppError::Validation(_))), "{:?}", schedule);
        }
    }

    #[test]
    fn test_last_bookable_day_saturates() {
        let today = NaiveDate::from_ymd_opt(2030, 3, 6).unwrap();
        let schedule = AvailabilitySchedule { max_advance_days: 10, ..AvailabilitySchedule::default() };
        assert_eq!(schedule.last_bookable_day(today), NaiveDate::from_ymd_opt(2030, 3, 16).unwrap());

        let unbounded = AvailabilitySchedule { max_advance_days: u32::MAX, ..AvailabilitySchedule::default() };
        assert_eq!(unbounded.last_bookable_day(today), NaiveDate::MAX);
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut schedule = AvailabilitySchedule::default();
        schedule.hours.set(Weekday::Wed, Some(TimeWindow { start: "9am".into(), end: "17:00".into(), slot_duration_min: 60 }));
        assert!(matches!(schedule.validate(), Err(AppError::Validation(_))));

        let ok = AvailabilitySchedule::default();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_malformed_window_only_fails_its_weekday() {
        let mut schedule = AvailabilitySchedule::default();
        schedule.hours.set(Weekday::Wed, Some(TimeWindow { start: "25:00".into(), end: "17:00".into(), slot_duration_min: 60 }));

        let wednesday = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        let thursday = NaiveDate::from_ymd_opt(2030, 1, 3).unwrap();
        assert!(schedule.window_for(wednesday).is_err());
        assert!(schedule.window_for(thursday).unwrap().is_some());
    }
}
