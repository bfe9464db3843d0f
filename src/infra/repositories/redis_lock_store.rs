use crate::domain::{models::lock::{SlotKey, SlotLock}, ports::SlotLockStore};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::info;

const KEY_PREFIX: &str = "inspection:slot_lock:";

/// Compare-and-delete: removes the key only while it still holds the caller's id.
const RELEASE_IF_OWNER: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Slot locks as Redis keys, set with `SET NX PX` and expired by Redis itself.
#[derive(Clone)]
pub struct RedisLockStore {
    conn_manager: ConnectionManager,
    release_script: Script,
}

impl RedisLockStore {
    pub async fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = Client::open(redis_url)
            .map_err(|e| AppError::Upstream(format!("Failed to create Redis client: {}", e)))?;
        let conn_manager = ConnectionManager::new(client).await
            .map_err(|e| AppError::Upstream(format!("Failed to create Redis connection manager: {}", e)))?;

        info!("RedisLockStore initialized");
        Ok(Self { conn_manager, release_script: Script::new(RELEASE_IF_OWNER) })
    }

    fn lock_key(key: &SlotKey) -> String {
        format!("{}{}:{}", KEY_PREFIX, key.date_str(), key.scope_str())
    }
}

#[async_trait]
impl SlotLockStore for RedisLockStore {
    async fn try_insert(&self, key: &SlotKey, booking_id: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.conn_manager.clone();
        let ttl_ms = ttl.num_milliseconds().max(1);
        let set: Option<String> = redis::cmd("SET")
            .arg(Self::lock_key(key)).arg(booking_id)
            .arg("NX").arg("PX").arg(ttl_ms)
            .query_async(&mut conn).await?;
        Ok(set.is_some())
    }

    async fn delete(&self, key: &SlotKey, booking_id: &str) -> Result<bool, AppError> {
        let mut conn = self.conn_manager.clone();
        let removed: i64 = self.release_script
            .key(Self::lock_key(key)).arg(booking_id)
            .invoke_async(&mut conn).await?;
        Ok(removed == 1)
    }

    async fn force_delete(&self, key: &SlotKey) -> Result<(), AppError> {
        let mut conn = self.conn_manager.clone();
        let _: i64 = conn.del(Self::lock_key(key)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SlotLock>, AppError> {
        let mut keys: Vec<String> = Vec::new();
        {
            let mut scan_conn = self.conn_manager.clone();
            let mut iter = scan_conn.scan_match::<_, String>(format!("{}*", KEY_PREFIX)).await?;
            while let Some(k) = iter.next_item().await {
                keys.push(k);
            }
        }

        let mut conn = self.conn_manager.clone();
        let mut locks = Vec::new();
        for k in keys {
            let (owner, pttl): (Option<String>, i64) = redis::pipe()
                .get(&k).pttl(&k)
                .query_async(&mut conn).await?;
            // Gone or expired between SCAN and GET.
            let Some(booking_id) = owner else { continue };
            if pttl < 0 {
                continue;
            }
            let Some((lock_date, lock_scope)) = k.trim_start_matches(KEY_PREFIX).split_once(':') else { continue };
            locks.push(SlotLock {
                lock_date: lock_date.to_string(),
                lock_scope: lock_scope.to_string(),
                booking_id,
                expires_at: Utc::now() + Duration::milliseconds(pttl),
            });
        }
        locks.sort_by(|a, b| (&a.lock_date, &a.lock_scope).cmp(&(&b.lock_date, &b.lock_scope)));
        Ok(locks)
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        // Redis expires keys on its own.
        Ok(0)
    }
}
