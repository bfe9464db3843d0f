use crate::domain::{models::{booking::Booking, notification::NotificationKind}, ports::{BookingFilter, BookingRepository}};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use chrono::{DateTime, NaiveDate, Utc};

const COMMITTED: &str = "status IN ('scheduled', 'completed', 'no_show')";

pub struct SqliteBookingRepo {
    pool: SqlitePool,
}

impl SqliteBookingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepo {
    async fn create(&self, booking: &Booking) -> Result<Booking, AppError> {
        sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, invoice_id, line_item_index, property_address, postal_code, zone, unit_count, tenant_name, tenant_phone, tenant_email, landlord_name, landlord_email, frequency, access_token, scheduled_date, scheduled_time, duration_min, reschedule_count, status, calendar_event_id, parent_booking_id, due_on, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&booking.id).bind(&booking.invoice_id).bind(booking.line_item_index).bind(&booking.property_address)
            .bind(&booking.postal_code).bind(booking.zone.as_str()).bind(booking.unit_count).bind(&booking.tenant_name)
            .bind(&booking.tenant_phone).bind(&booking.tenant_email).bind(&booking.landlord_name).bind(&booking.landlord_email)
            .bind(booking.frequency.as_str()).bind(&booking.access_token).bind(booking.scheduled_date).bind(booking.scheduled_time)
            .bind(booking.duration_min).bind(booking.reschedule_count).bind(booking.status.as_str()).bind(&booking.calendar_event_id)
            .bind(&booking.parent_booking_id).bind(booking.due_on).bind(booking.created_at).bind(booking.updated_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }
    async fn find_by_token(&self, token: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE access_token = ?").bind(token).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }
    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, AppError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM bookings WHERE 1 = 1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(zone) = filter.zone {
            qb.push(" AND zone = ").push_bind(zone.as_str());
        }
        if let Some(from) = filter.from {
            qb.push(" AND scheduled_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND scheduled_date <= ").push_bind(to);
        }
        qb.push(" ORDER BY scheduled_date IS NULL, scheduled_date ASC, scheduled_time ASC, created_at ASC");
        qb.build_query_as::<Booking>().fetch_all(&self.pool).await.map_err(AppError::Database)
    }
    async fn list_committed_on(&self, date: NaiveDate) -> Result<Vec<Booking>, AppError> {
        self.list_committed_between(date, date).await
    }
    async fn list_committed_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Booking>, AppError> {
        let sql = format!("SELECT * FROM bookings WHERE scheduled_date >= ? AND scheduled_date <= ? AND {} ORDER BY scheduled_date ASC, scheduled_time ASC", COMMITTED);
        sqlx::query_as::<_, Booking>(&sql).bind(from).bind(to).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
    async fn save_transition(&self, updated: &Booking, previous: &Booking) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET scheduled_date = ?, scheduled_time = ?, duration_min = ?, reschedule_count = ?, status = ?, updated_at = ?
             WHERE id = ? AND status = ? AND reschedule_count = ?
             RETURNING *"
        )
            .bind(updated.scheduled_date).bind(updated.scheduled_time).bind(updated.duration_min).bind(updated.reschedule_count)
            .bind(updated.status.as_str()).bind(updated.updated_at)
            .bind(&previous.id).bind(previous.status.as_str()).bind(previous.reschedule_count)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }
    async fn record_notification(&self, id: &str, kind: NotificationKind, at: DateTime<Utc>) -> Result<(), AppError> {
        let Some(column) = kind.audit_column() else { return Ok(()) };
        let sql = format!("UPDATE bookings SET {0} = COALESCE({0}, ?) WHERE id = ?", column);
        sqlx::query(&sql).bind(at).bind(id).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }
    async fn set_calendar_event(&self, id: &str, event_id: Option<&str>) -> Result<(), AppError> {
        sqlx::query("UPDATE bookings SET calendar_event_id = ? WHERE id = ?").bind(event_id).bind(id).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }
    async fn list_stale_pending(&self, created_before: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE status = 'pending_tenant' AND created_at < ? ORDER BY created_at ASC").bind(created_before).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
}
