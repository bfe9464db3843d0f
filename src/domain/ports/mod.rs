use crate::domain::models::{
    booking::{Booking, BookingStatus},
    lock::{SlotKey, SlotLock},
    notification::{CalendarAppointment, Notification, NotificationKind},
    schedule::AvailabilitySchedule,
    zone::ServiceZone,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Filters for the administrative booking listing.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub zone: Option<ServiceZone>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<Booking>, AppError>;
    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError>;
    /// Bookings occupying the inspector on `date`: every status except pending and cancelled.
    async fn list_committed_on(&self, date: NaiveDate) -> Result<Vec<Booking>, AppError>;
    /// Same as `list_committed_on` over the inclusive range `[from, to]`.
    async fn list_committed_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Booking>, AppError>;
    /// Writes `updated` only if the stored row still has `previous`'s status and reschedule count.
    async fn save_transition(&self, updated: &Booking, previous: &Booking) -> Result<Option<Booking>, AppError>;
    async fn record_notification(&self, id: &str, kind: NotificationKind, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn set_calendar_event(&self, id: &str, event_id: Option<&str>) -> Result<(), AppError>;
    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Current schedule, or the default one when none has been stored yet.
    async fn get(&self) -> Result<AvailabilitySchedule, AppError>;
    /// Stores `schedule` as version `expected_version + 1`; `None` if another update won.
    async fn save(&self, schedule: &AvailabilitySchedule, expected_version: i64) -> Result<Option<AvailabilitySchedule>, AppError>;
}

/// Atomic conditional-insert over a shared key-value space.
#[async_trait]
pub trait SlotLockStore: Send + Sync {
    /// Sets the key if absent (or expired), returning `true` only when this call created it.
    async fn try_insert(&self, key: &SlotKey, booking_id: &str, ttl: Duration) -> Result<bool, AppError>;
    /// Deletes the key only while `booking_id` owns it. `true` when a row was removed.
    async fn delete(&self, key: &SlotKey, booking_id: &str) -> Result<bool, AppError>;
    /// Deletes the key whoever holds it.
    async fn force_delete(&self, key: &SlotKey) -> Result<(), AppError>;
    async fn list(&self) -> Result<Vec<SlotLock>, AppError>;
    async fn purge_expired(&self) -> Result<u64, AppError>;
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

#[async_trait]
pub trait CalendarMirror: Send + Sync {
    /// Creates the event, or updates `event_id` when given. Returns the event id to keep.
    async fn upsert(&self, event_id: Option<&str>, appointment: &CalendarAppointment) -> Result<String, AppError>;
    async fn remove(&self, event_id: &str) -> Result<(), AppError>;
}
