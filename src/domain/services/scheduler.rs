use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::domain::models::booking::{Booking, BookingStatus, InspectionFrequency, NewBookingParams};
use crate::domain::models::lock::{SlotKey, SlotLock};
use crate::domain::models::notification::NotificationKind;
use crate::domain::models::schedule::{AvailabilitySchedule, CapacityEnforcement};
use crate::domain::models::slot::{DateAvailability, DateReason, SlotReason, TimeSlot};
use crate::domain::ports::{BookingFilter, BookingRepository, CalendarMirror, NotificationGateway, ScheduleRepository};
use crate::domain::services::booking_machine::{self, Effect, NoticeRule, TransitionOutcome};
use crate::domain::services::calendar::appointment_for;
use crate::domain::services::lock_manager::SlotLockManager;
use crate::domain::services::messages::MessageComposer;
use crate::domain::services::slots::{slot_starts, DayContext};
use crate::domain::services::zones::ZoneClassifier;
use crate::error::{AppError, PolicyReason};

/// Booking as delivered by the invoice source.
#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub invoice_id: String,
    pub line_item_index: i32,
    pub property_address: String,
    pub unit_count: i32,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub tenant_email: Option<String>,
    pub landlord_name: String,
    pub landlord_email: String,
    pub frequency: String,
}

#[derive(Debug, Clone)]
pub struct ScheduledBooking {
    pub booking: Booking,
    pub message: String,
}

pub struct SchedulerService {
    bookings: Arc<dyn BookingRepository>,
    schedules: Arc<dyn ScheduleRepository>,
    locks: SlotLockManager,
    zones: Arc<ZoneClassifier>,
    notifier: Arc<dyn NotificationGateway>,
    calendar: Arc<dyn CalendarMirror>,
    messages: MessageComposer,
}

fn reject(reason: SlotReason) -> AppError {
    match reason.policy() {
        Some(policy) => AppError::PolicyViolation(policy),
        None => AppError::slot_taken(),
    }
}

impl SchedulerService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        schedules: Arc<dyn ScheduleRepository>,
        locks: SlotLockManager,
        zones: Arc<ZoneClassifier>,
        notifier: Arc<dyn NotificationGateway>,
        calendar: Arc<dyn CalendarMirror>,
        messages: MessageComposer,
    ) -> Self {
        Self { bookings, schedules, locks, zones, notifier, calendar, messages }
    }

    pub fn zones(&self) -> &ZoneClassifier {
        &self.zones
    }

    pub fn manage_link(&self, booking: &Booking) -> String {
        self.messages.manage_link(booking)
    }

    pub async fn get_by_token(&self, token: &str) -> Result<Booking, AppError> {
        self.bookings.find_by_token(token).await?
            .ok_or(AppError::NotFound("Booking link not found".into()))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Booking, AppError> {
        self.bookings.find_by_id(id).await?
            .ok_or(AppError::NotFound(format!("Booking {} not found", id)))
    }

    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
        self.bookings.list(filter).await
    }

    async fn committed_on(&self, date: NaiveDate, excluding: &str) -> Result<Vec<Booking>, AppError> {
        let mut committed = self.bookings.list_committed_on(date).await?;
        committed.retain(|b| b.id != excluding);
        Ok(committed)
    }

    pub async fn create_booking(&self, input: CreateBookingInput) -> Result<Booking, AppError> {
        if input.property_address.trim().is_empty() {
            return Err(AppError::Validation("Property address is required".into()));
        }
        if input.tenant_phone.trim().is_empty() {
            return Err(AppError::Validation("Tenant phone is required".into()));
        }
        let frequency: InspectionFrequency = input.frequency.parse().map_err(AppError::Validation)?;
        let (postal_code, zone) = self.zones.classify_address(&input.property_address);

        let booking = Booking::new(NewBookingParams {
            invoice_id: input.invoice_id,
            line_item_index: input.line_item_index,
            property_address: input.property_address.trim().to_string(),
            postal_code,
            zone,
            unit_count: input.unit_count,
            tenant_name: input.tenant_name,
            tenant_phone: input.tenant_phone,
            tenant_email: input.tenant_email.filter(|e| !e.trim().is_empty()),
            landlord_name: input.landlord_name,
            landlord_email: input.landlord_email,
            frequency,
        });

        let created = self.bookings.create(&booking).await?;
        info!("Created booking {} for invoice {} (zone {})", created.id, created.invoice_id, created.zone);

        let schedule = self.schedules.get().await?;
        self.notify(&created, NotificationKind::BookingLink, &schedule.tz()?).await;
        Ok(created)
    }

    pub async fn list_dates(&self, token: &str, reschedule: bool) -> Result<Vec<DateAvailability>, AppError> {
        let booking = self.get_by_token(token).await?;
        let schedule = self.schedules.get().await?;
        let tz = schedule.tz()?;
        let now = Utc::now();

        if reschedule {
            booking_machine::check_reschedulable(&booking, &self.notice_rule(&schedule, now)?)?;
        } else if booking.status.is_terminal() {
            return Err(AppError::InvalidState { status: booking.status });
        }

        let today = now.with_timezone(&tz).date_naive();
        let last = schedule.last_bookable_day(today);

        let mut by_date: HashMap<NaiveDate, Vec<Booking>> = HashMap::new();
        for other in self.bookings.list_committed_between(today, last).await? {
            if other.id == booking.id {
                continue;
            }
            if let Some(date) = other.scheduled_date {
                by_date.entry(date).or_default().push(other);
            }
        }

        let mut dates = Vec::new();
        for date in today.iter_days().take_while(|d| *d <= last) {
            let committed = by_date.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let ctx = DayContext {
                schedule: &schedule,
                matrix: self.zones.matrix(),
                date,
                zone: booking.zone,
                committed,
                now,
            };
            match ctx.date_availability() {
                Ok(entry) => dates.push(entry),
                Err(e) => {
                    warn!("Treating {} as closed: {}", date, e);
                    dates.push(DateAvailability { date, available: false, reason: Some(DateReason::Closed) });
                }
            }
        }
        Ok(dates)
    }

    pub async fn list_slots(&self, token: &str, date: NaiveDate) -> Result<Vec<TimeSlot>, AppError> {
        let booking = self.get_by_token(token).await?;
        if booking.status.is_terminal() {
            return Err(AppError::InvalidState { status: booking.status });
        }
        let schedule = self.schedules.get().await?;
        let committed = self.committed_on(date, &booking.id).await?;

        let ctx = DayContext {
            schedule: &schedule,
            matrix: self.zones.matrix(),
            date,
            zone: booking.zone,
            committed: &committed,
            now: Utc::now(),
        };
        ctx.generate_slots()
    }

    /// Slot length at `time`, or a validation error when `time` is not an offered start.
    fn slot_length(schedule: &AvailabilitySchedule, date: NaiveDate, time: NaiveTime) -> Result<Duration, AppError> {
        let window = schedule.window_for(date)?
            .ok_or(AppError::Validation("No inspections are offered on this day.".into()))?;
        if !slot_starts(&window).contains(&time) {
            return Err(AppError::Validation("This time is not one of the offered slots.".into()));
        }
        Ok(window.slot_duration)
    }

    async fn acquire_claim(&self, schedule: &AvailabilitySchedule, date: NaiveDate, time: NaiveTime, booking_id: &str) -> Result<Vec<SlotKey>, AppError> {
        let slot = SlotKey::slot(date, time);
        if !self.locks.acquire(&slot, booking_id).await? {
            info!("Slot {} already locked, rejecting booking {}", slot, booking_id);
            return Err(AppError::slot_taken());
        }
        let mut held = vec![slot];

        if schedule.capacity_enforcement == CapacityEnforcement::PerDayLock {
            let day = SlotKey::day(date);
            match self.locks.acquire(&day, booking_id).await {
                Ok(true) => held.push(day),
                Ok(false) => {
                    self.locks.release_quietly(&held, booking_id).await;
                    return Err(AppError::Conflict("Another inspection on this day is being booked right now. Please try again.".into()));
                }
                Err(e) => {
                    self.locks.release_quietly(&held, booking_id).await;
                    return Err(e);
                }
            }
        }
        Ok(held)
    }

    /// Final evaluation against fresh data, with the same rules the slot listing uses.
    async fn revalidate(&self, schedule: &AvailabilitySchedule, booking: &Booking, date: NaiveDate, time: NaiveTime, length: Duration) -> Result<Option<SlotReason>, AppError> {
        let committed = self.committed_on(date, &booking.id).await?;
        let ctx = DayContext {
            schedule,
            matrix: self.zones.matrix(),
            date,
            zone: booking.zone,
            committed: &committed,
            now: Utc::now(),
        };
        ctx.evaluate_candidate(time, length)
    }

    async fn store_transition(&self, outcome: &TransitionOutcome, previous: &Booking) -> Result<Booking, AppError> {
        match self.bookings.save_transition(&outcome.booking, previous).await? {
            Some(saved) => Ok(saved),
            None => {
                let current = self.get_by_id(&previous.id).await?;
                warn!("Booking {} changed concurrently (now {})", previous.id, current.status);
                Err(AppError::InvalidState { status: current.status })
            }
        }
    }

    pub async fn confirm(&self, token: &str, date: NaiveDate, time: NaiveTime) -> Result<ScheduledBooking, AppError> {
        let booking = self.get_by_token(token).await?;
        if booking.status != BookingStatus::PendingTenant {
            return Err(AppError::InvalidState { status: booking.status });
        }
        let schedule = self.schedules.get().await?;
        let tz = schedule.tz()?;
        let length = Self::slot_length(&schedule, date, time)?;

        let held = self.acquire_claim(&schedule, date, time, &booking.id).await?;
        let committed = async {
            if let Some(reason) = self.revalidate(&schedule, &booking, date, time, length).await? {
                info!("Booking {} rejected at {} {}: {:?}", booking.id, date, time, reason);
                return Err(reject(reason));
            }
            let outcome = booking_machine::confirm(&booking, date, time, length.num_minutes() as i32, Utc::now())?;
            let saved = self.store_transition(&outcome, &booking).await?;
            Ok::<_, AppError>((saved, outcome.effects))
        }.await;
        // The stored booking now holds the slot; locks only cover the critical section.
        self.locks.release_quietly(&held, &booking.id).await;

        let (saved, effects) = committed?;
        info!("Booking {} scheduled for {} {}", saved.id, date, time.format("%H:%M"));

        let booking = self.run_effects(saved, effects, &tz).await;
        let message = self.messages.render(NotificationKind::Confirmation, &booking, &tz)?;
        Ok(ScheduledBooking { booking, message })
    }

    fn notice_rule(&self, schedule: &AvailabilitySchedule, now: DateTime<Utc>) -> Result<NoticeRule, AppError> {
        Ok(NoticeRule { tz: schedule.tz()?, min_notice: schedule.min_notice(), now })
    }

    pub async fn reschedule(&self, token: &str, date: NaiveDate, time: NaiveTime) -> Result<ScheduledBooking, AppError> {
        let booking = self.get_by_token(token).await?;
        let schedule = self.schedules.get().await?;
        let tz = schedule.tz()?;
        booking_machine::check_reschedule(&booking, date, time, &self.notice_rule(&schedule, Utc::now())?)?;
        let length = Self::slot_length(&schedule, date, time)?;

        // New slot first: the booking always keeps one consistent appointment.
        let held = self.acquire_claim(&schedule, date, time, &booking.id).await?;
        let committed = async {
            if let Some(reason) = self.revalidate(&schedule, &booking, date, time, length).await? {
                info!("Reschedule of {} rejected at {} {}: {:?}", booking.id, date, time, reason);
                return Err(match reason {
                    SlotReason::MinNotice => AppError::PolicyViolation(PolicyReason::NewWithinNotice),
                    other => reject(other),
                });
            }
            let outcome = booking_machine::reschedule(&booking, date, time, length.num_minutes() as i32, &self.notice_rule(&schedule, Utc::now())?)?;
            let saved = self.store_transition(&outcome, &booking).await?;
            Ok::<_, AppError>((saved, outcome.effects))
        }.await;
        self.locks.release_quietly(&held, &booking.id).await;

        // The old slot was never locked past its own commit; the updated row frees it.
        let (saved, effects) = committed?;
        info!("Booking {} rescheduled to {} {} ({} of {})", saved.id, date, time.format("%H:%M"), saved.reschedule_count, booking_machine::MAX_RESCHEDULES);

        let booking = self.run_effects(saved, effects, &tz).await;
        let message = self.messages.render(NotificationKind::Reschedule, &booking, &tz)?;
        Ok(ScheduledBooking { booking, message })
    }

    async fn apply(&self, booking: Booking, outcome: TransitionOutcome) -> Result<Booking, AppError> {
        if !outcome.changed {
            return Ok(outcome.booking);
        }
        let tz = self.schedules.get().await?.tz()?;
        let saved = self.store_transition(&outcome, &booking).await?;
        info!("Booking {} moved {} -> {}", saved.id, booking.status, saved.status);
        Ok(self.run_effects(saved, outcome.effects, &tz).await)
    }

    async fn cancel_booking(&self, booking: Booking) -> Result<Booking, AppError> {
        let outcome = booking_machine::cancel(&booking, Utc::now())?;
        if outcome.changed && let Some(key) = booking.slot_key() {
            self.locks.release(&key, &booking.id).await?;
        }
        self.apply(booking, outcome).await
    }

    pub async fn cancel_by_token(&self, token: &str) -> Result<Booking, AppError> {
        let booking = self.get_by_token(token).await?;
        self.cancel_booking(booking).await
    }

    pub async fn cancel(&self, id: &str) -> Result<Booking, AppError> {
        let booking = self.get_by_id(id).await?;
        self.cancel_booking(booking).await
    }

    pub async fn complete(&self, id: &str) -> Result<Booking, AppError> {
        let booking = self.get_by_id(id).await?;
        let outcome = booking_machine::complete(&booking, Utc::now())?;
        self.apply(booking, outcome).await
    }

    pub async fn mark_no_show(&self, id: &str) -> Result<Booking, AppError> {
        let booking = self.get_by_id(id).await?;
        let outcome = booking_machine::mark_no_show(&booking, Utc::now())?;
        self.apply(booking, outcome).await
    }

    /// Runs post-commit effects. Failures are logged; the transition already happened.
    async fn run_effects(&self, booking: Booking, effects: Vec<Effect>, tz: &Tz) -> Booking {
        let mut booking = booking;
        for effect in effects {
            match effect {
                Effect::Notify(kind) => self.notify(&booking, kind, tz).await,
                Effect::MirrorCalendar => {
                    if let Some(event_id) = self.mirror(&booking, tz).await {
                        booking.calendar_event_id = Some(event_id);
                    }
                }
                Effect::RemoveCalendarEvent(event_id) => {
                    match self.calendar.remove(&event_id).await {
                        Ok(()) => {
                            if let Err(e) = self.bookings.set_calendar_event(&booking.id, None).await {
                                error!("Failed to clear calendar event on {}: {}", booking.id, e);
                            }
                            booking.calendar_event_id = None;
                        }
                        Err(e) => error!("Failed to remove calendar event {} for {}: {}", event_id, booking.id, e),
                    }
                }
                Effect::SpawnRecurrence(next) => match self.bookings.create(&next).await {
                    Ok(created) => {
                        info!("Created next occurrence {} of booking {} due {:?}", created.id, booking.id, created.due_on);
                        self.notify(&created, NotificationKind::BookingLink, tz).await;
                    }
                    Err(e) => error!("Failed to create next occurrence of booking {}: {}", booking.id, e),
                },
            }
        }
        booking
    }

    async fn mirror(&self, booking: &Booking, tz: &Tz) -> Option<String> {
        let appointment = appointment_for(booking, tz, &self.zones.display_name(booking.zone))?;
        match self.calendar.upsert(booking.calendar_event_id.as_deref(), &appointment).await {
            Ok(event_id) => {
                if let Err(e) = self.bookings.set_calendar_event(&booking.id, Some(&event_id)).await {
                    error!("Failed to store calendar event on {}: {}", booking.id, e);
                }
                Some(event_id)
            }
            Err(e) => {
                error!("Calendar mirror failed for booking {}: {}", booking.id, e);
                None
            }
        }
    }

    async fn notify(&self, booking: &Booking, kind: NotificationKind, tz: &Tz) {
        let notifications = match self.messages.compose(kind, booking, tz) {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to compose {:?} for booking {}: {}", kind, booking.id, e);
                return;
            }
        };

        let mut delivered = false;
        for notification in &notifications {
            match self.notifier.send(notification).await {
                Ok(()) => delivered = true,
                Err(e) => error!("Failed to send {:?} via {:?} for booking {}: {}", kind, notification.channel, booking.id, e),
            }
        }

        if delivered && kind.audit_column().is_some()
            && let Err(e) = self.bookings.record_notification(&booking.id, kind, Utc::now()).await {
            error!("Failed to record {:?} dispatch for booking {}: {}", kind, booking.id, e);
        }
    }

    pub async fn get_schedule(&self) -> Result<AvailabilitySchedule, AppError> {
        self.schedules.get().await
    }

    pub async fn update_schedule(&self, schedule: AvailabilitySchedule) -> Result<AvailabilitySchedule, AppError> {
        schedule.validate()?;
        let expected = schedule.version;
        let saved = self.schedules.save(&schedule, expected).await?
            .ok_or(AppError::Conflict("The schedule was changed by someone else. Reload and try again.".into()))?;
        info!("Availability schedule updated to version {}", saved.version);
        Ok(saved)
    }

    pub async fn list_locks(&self) -> Result<Vec<SlotLock>, AppError> {
        self.locks.list().await
    }

    pub async fn release_lock(&self, date: &str, scope: &str) -> Result<(), AppError> {
        let key = SlotKey::parse(date, scope)
            .ok_or(AppError::Validation(format!("Invalid lock key {} {}", date, scope)))?;
        self.locks.force_release(&key).await?;
        warn!("Lock {} released manually", key);
        Ok(())
    }

    pub async fn purge_expired_locks(&self) -> Result<u64, AppError> {
        self.locks.purge_expired().await
    }

    /// Cancels pending bookings whose link was issued more than `ttl` ago.
    pub async fn expire_stale_links(&self, ttl: Duration) -> Result<u64, AppError> {
        let stale = self.bookings.list_stale_pending(Utc::now() - ttl).await?;
        let mut expired = 0;
        for booking in stale {
            let id = booking.id.clone();
            match self.cancel_booking(booking).await {
                Ok(_) => expired += 1,
                Err(e) => warn!("Could not expire booking {}: {}", id, e),
            }
        }
        Ok(expired)
    }
}
