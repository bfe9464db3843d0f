use crate::domain::{models::lock::{SlotKey, SlotLock}, ports::SlotLockStore};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;
use chrono::{Duration, Utc};

/// Lock rows keyed by the `(lock_date, lock_scope)` primary key.
pub struct SqliteLockRepo {
    pool: SqlitePool,
}

impl SqliteLockRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotLockStore for SqliteLockRepo {
    async fn try_insert(&self, key: &SlotKey, booking_id: &str, ttl: Duration) -> Result<bool, AppError> {
        let now = Utc::now();
        // An expired row is taken over in the same statement, so it counts as absent.
        let result = sqlx::query("INSERT INTO slot_locks (lock_date, lock_scope, booking_id, expires_at) VALUES (?, ?, ?, ?) ON CONFLICT(lock_date, lock_scope) DO UPDATE SET booking_id = excluded.booking_id, expires_at = excluded.expires_at WHERE slot_locks.expires_at <= ?")
            .bind(key.date_str()).bind(key.scope_str()).bind(booking_id).bind(now + ttl).bind(now)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }
    async fn delete(&self, key: &SlotKey, booking_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM slot_locks WHERE lock_date = ? AND lock_scope = ? AND booking_id = ?").bind(key.date_str()).bind(key.scope_str()).bind(booking_id).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }
    async fn force_delete(&self, key: &SlotKey) -> Result<(), AppError> {
        sqlx::query("DELETE FROM slot_locks WHERE lock_date = ? AND lock_scope = ?").bind(key.date_str()).bind(key.scope_str()).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }
    async fn list(&self) -> Result<Vec<SlotLock>, AppError> {
        sqlx::query_as::<_, SlotLock>("SELECT * FROM slot_locks WHERE expires_at > ? ORDER BY lock_date ASC, lock_scope ASC").bind(Utc::now()).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
    async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM slot_locks WHERE expires_at <= ?").bind(Utc::now()).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
