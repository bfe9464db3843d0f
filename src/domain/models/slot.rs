use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};

use crate::error::PolicyReason;

/// Why a candidate slot is unavailable, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotReason {
    BlockedDate,
    OutsideBookingWindow,
    ZoneRestricted,
    DayFull,
    MinNotice,
    Overlap,
    TravelBuffer,
}

impl SlotReason {
    /// Overlap and travel-buffer rejections are races on the day's data and have no
    /// policy reason; the rest are policy.
    pub fn policy(&self) -> Option<PolicyReason> {
        match self {
            SlotReason::BlockedDate => Some(PolicyReason::BlockedDate),
            SlotReason::OutsideBookingWindow => Some(PolicyReason::OutsideBookingWindow),
            SlotReason::ZoneRestricted => Some(PolicyReason::ZoneRestricted),
            SlotReason::DayFull => Some(PolicyReason::DayFull),
            SlotReason::MinNotice => Some(PolicyReason::MinNotice),
            SlotReason::Overlap | SlotReason::TravelBuffer => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateReason {
    Closed,
    BlockedDate,
    OutsideBookingWindow,
    ZoneRestricted,
    DayFull,
    NoOpenSlots,
}

fn hhmm<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&time.format("%H:%M"))
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    #[serde(serialize_with = "hhmm")]
    pub start: NaiveTime,
    #[serde(serialize_with = "hhmm")]
    pub end: NaiveTime,
    pub available: bool,
    pub reason: Option<SlotReason>,
    pub preferred: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub available: bool,
    pub reason: Option<DateReason>,
}
