use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;

pub const DAY_SCOPE: &str = "DAY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScope {
    At(NaiveTime),
    Day,
}

/// Key of a slot lock: the exact slot `(date, time)`, or the per-day capacity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub scope: LockScope,
}

impl SlotKey {
    pub fn slot(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, scope: LockScope::At(time) }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self { date, scope: LockScope::Day }
    }

    pub fn scope_str(&self) -> String {
        match self.scope {
            LockScope::At(time) => time.format("%H:%M").to_string(),
            LockScope::Day => DAY_SCOPE.to_string(),
        }
    }

    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    pub fn parse(date: &str, scope: &str) -> Option<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        if scope == DAY_SCOPE {
            return Some(Self::day(date));
        }
        let time = NaiveTime::parse_from_str(scope, "%H:%M").ok()?;
        Some(Self::slot(date, time))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date_str(), self.scope_str())
    }
}

/// Stored lock row, only read for administrative inspection.
#[derive(Debug, Serialize, FromRow, Clone)]
pub struct SlotLock {
    pub lock_date: String,
    pub lock_scope: String,
    pub booking_id: String,
    pub expires_at: DateTime<Utc>,
}
