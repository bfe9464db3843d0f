//! Lifecycle of a single booking.
//!
//! Every transition is a pure function of the current record and returns the
//! updated record plus the side effects the caller must run once the update
//! has been committed.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::domain::models::booking::{Booking, BookingStatus};
use crate::domain::models::notification::NotificationKind;
use crate::error::{AppError, PolicyReason};

pub const MAX_RESCHEDULES: i32 = 2;

#[derive(Debug, Clone)]
pub enum Effect {
    Notify(NotificationKind),
    /// Create or update the calendar event for the booking's current appointment.
    MirrorCalendar,
    RemoveCalendarEvent(String),
    SpawnRecurrence(Box<Booking>),
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub booking: Booking,
    pub effects: Vec<Effect>,
    /// `false` when the transition was a no-op and nothing needs storing.
    pub changed: bool,
}

impl TransitionOutcome {
    fn changed(booking: Booking, effects: Vec<Effect>) -> Self {
        Self { booking, effects, changed: true }
    }
}

/// The minimum-notice rule as it applies to one booking.
pub struct NoticeRule {
    pub tz: Tz,
    pub min_notice: Duration,
    pub now: DateTime<Utc>,
}

impl NoticeRule {
    fn cutoff(&self) -> DateTime<Utc> {
        self.now.checked_add_signed(self.min_notice).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn clears(&self, starts_at: Option<DateTime<Utc>>) -> bool {
        starts_at.is_some_and(|at| at >= self.cutoff())
    }

    fn clears_local(&self, date: NaiveDate, time: NaiveTime) -> bool {
        use chrono::TimeZone;
        let starts_at = self.tz.from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
        self.clears(starts_at)
    }
}

fn schedule_at(booking: &Booking, date: NaiveDate, time: NaiveTime, duration_min: i32, now: DateTime<Utc>) -> Booking {
    Booking {
        scheduled_date: Some(date),
        scheduled_time: Some(time),
        duration_min: Some(duration_min),
        status: BookingStatus::Scheduled,
        updated_at: now,
        ..booking.clone()
    }
}

pub fn confirm(booking: &Booking, date: NaiveDate, time: NaiveTime, duration_min: i32, now: DateTime<Utc>) -> Result<TransitionOutcome, AppError> {
    if booking.status != BookingStatus::PendingTenant {
        return Err(AppError::InvalidState { status: booking.status });
    }

    let updated = schedule_at(booking, date, time, duration_min, now);
    Ok(TransitionOutcome::changed(updated, vec![
        Effect::Notify(NotificationKind::Confirmation),
        Effect::MirrorCalendar,
    ]))
}

/// The preconditions that do not depend on the new time.
pub fn check_reschedulable(booking: &Booking, notice: &NoticeRule) -> Result<(), AppError> {
    if booking.status != BookingStatus::Scheduled {
        return Err(AppError::InvalidState { status: booking.status });
    }
    if booking.reschedule_count >= MAX_RESCHEDULES {
        return Err(AppError::PolicyViolation(PolicyReason::RescheduleLimit));
    }
    if !notice.clears(booking.starts_at(&notice.tz)) {
        return Err(AppError::PolicyViolation(PolicyReason::CurrentWithinNotice));
    }
    Ok(())
}

/// Reschedule preconditions, checked in order so each failure has one reason.
pub fn check_reschedule(booking: &Booking, new_date: NaiveDate, new_time: NaiveTime, notice: &NoticeRule) -> Result<(), AppError> {
    check_reschedulable(booking, notice)?;
    if !notice.clears_local(new_date, new_time) {
        return Err(AppError::PolicyViolation(PolicyReason::NewWithinNotice));
    }
    if booking.scheduled_date == Some(new_date) && booking.scheduled_time == Some(new_time) {
        return Err(AppError::Validation("The new time is the same as the current appointment.".into()));
    }
    Ok(())
}

pub fn reschedule(booking: &Booking, new_date: NaiveDate, new_time: NaiveTime, duration_min: i32, notice: &NoticeRule) -> Result<TransitionOutcome, AppError> {
    check_reschedule(booking, new_date, new_time, notice)?;

    let mut updated = schedule_at(booking, new_date, new_time, duration_min, notice.now);
    updated.reschedule_count += 1;
    Ok(TransitionOutcome::changed(updated, vec![
        Effect::Notify(NotificationKind::Reschedule),
        Effect::MirrorCalendar,
    ]))
}

pub fn complete(booking: &Booking, now: DateTime<Utc>) -> Result<TransitionOutcome, AppError> {
    if booking.status != BookingStatus::Scheduled {
        return Err(AppError::InvalidState { status: booking.status });
    }

    let updated = Booking { status: BookingStatus::Completed, updated_at: now, ..booking.clone() };
    let mut effects = vec![Effect::Notify(NotificationKind::Completion)];

    let completed_on = booking.scheduled_date.unwrap_or_else(|| now.date_naive());
    if let Some(next) = booking.next_occurrence(completed_on) {
        effects.push(Effect::SpawnRecurrence(Box::new(next)));
    }
    Ok(TransitionOutcome::changed(updated, effects))
}

pub fn cancel(booking: &Booking, now: DateTime<Utc>) -> Result<TransitionOutcome, AppError> {
    match booking.status {
        BookingStatus::Cancelled => Ok(TransitionOutcome { booking: booking.clone(), effects: Vec::new(), changed: false }),
        BookingStatus::PendingTenant => {
            let updated = Booking { status: BookingStatus::Cancelled, updated_at: now, ..booking.clone() };
            Ok(TransitionOutcome::changed(updated, Vec::new()))
        }
        BookingStatus::Scheduled => {
            let updated = Booking { status: BookingStatus::Cancelled, updated_at: now, ..booking.clone() };
            let mut effects = vec![Effect::Notify(NotificationKind::Cancellation)];
            if let Some(event_id) = &booking.calendar_event_id {
                effects.push(Effect::RemoveCalendarEvent(event_id.clone()));
            }
            Ok(TransitionOutcome::changed(updated, effects))
        }
        status => Err(AppError::InvalidState { status }),
    }
}

pub fn mark_no_show(booking: &Booking, now: DateTime<Utc>) -> Result<TransitionOutcome, AppError> {
    if booking.status != BookingStatus::Scheduled {
        return Err(AppError::InvalidState { status: booking.status });
    }
    let updated = Booking { status: BookingStatus::NoShow, updated_at: now, ..booking.clone() };
    Ok(TransitionOutcome::changed(updated, Vec::new()))
}
