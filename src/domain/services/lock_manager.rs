use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::domain::models::lock::{SlotKey, SlotLock};
use crate::domain::ports::SlotLockStore;
use crate::error::AppError;

/// Short-lived mutual exclusion over `(date, time)` keys.
pub struct SlotLockManager {
    store: Arc<dyn SlotLockStore>,
    ttl: Duration,
    timeout: std::time::Duration,
}

impl SlotLockManager {
    pub fn new(store: Arc<dyn SlotLockStore>, ttl: Duration, timeout: std::time::Duration) -> Self {
        Self { store, ttl, timeout }
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T, AppError>>) -> Result<T, AppError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Upstream(format!("Lock store {} timed out after {:?}", op, self.timeout))),
        }
    }

    /// `true` only if this call created the key.
    pub async fn acquire(&self, key: &SlotKey, booking_id: &str) -> Result<bool, AppError> {
        let acquired = self.bounded("acquire", self.store.try_insert(key, booking_id, self.ttl)).await?;
        debug!("Lock {} for booking {}: {}", key, booking_id, if acquired { "acquired" } else { "held elsewhere" });
        Ok(acquired)
    }

    /// Releases `key` if `booking_id` still holds it. A missing or foreign key is left alone.
    pub async fn release(&self, key: &SlotKey, booking_id: &str) -> Result<(), AppError> {
        let removed = self.bounded("release", self.store.delete(key, booking_id)).await?;
        if removed {
            debug!("Lock {} released by booking {}", key, booking_id);
        } else {
            debug!("Lock {} not held by booking {}, nothing to release", key, booking_id);
        }
        Ok(())
    }

    /// Release on an unhappy path: a failure here must not mask the original error.
    pub async fn release_quietly(&self, keys: &[SlotKey], booking_id: &str) {
        for key in keys {
            if let Err(e) = self.release(key, booking_id).await {
                warn!("Failed to release lock {}: {}", key, e);
            }
        }
    }

    /// Administrative release regardless of the holder.
    pub async fn force_release(&self, key: &SlotKey) -> Result<(), AppError> {
        self.bounded("force release", self.store.force_delete(key)).await
    }

    pub async fn list(&self) -> Result<Vec<SlotLock>, AppError> {
        self.bounded("list", self.store.list()).await
    }

    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.bounded("purge", self.store.purge_expired()).await
    }
}
