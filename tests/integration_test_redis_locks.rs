use chrono::{Duration, NaiveDate, NaiveTime};
use inspection_scheduler::domain::models::lock::SlotKey;
use inspection_scheduler::domain::ports::SlotLockStore;
use inspection_scheduler::infra::repositories::redis_lock_store::RedisLockStore;
use uuid::Uuid;

// Run with: REDIS_URL=redis://127.0.0.1:6379 cargo test --test integration_test_redis_locks -- --ignored

async fn store() -> RedisLockStore {
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must point at a disposable Redis");
    RedisLockStore::new(&url).await.expect("Failed to connect to Redis")
}

/// A key no other run will touch: a far-future date picked at random.
fn fresh_key() -> SlotKey {
    let offset = (Uuid::new_v4().as_u128() % 300_000) as i64;
    let date = NaiveDate::from_ymd_opt(2200, 1, 1).unwrap() + Duration::days(offset);
    SlotKey::slot(date, NaiveTime::from_hms_opt(9, 0, 0).unwrap())
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_set_nx_has_a_single_winner() {
    let store = store().await;
    let key = fresh_key();

    assert!(store.try_insert(&key, "first", Duration::seconds(30)).await.unwrap());
    assert!(!store.try_insert(&key, "second", Duration::seconds(30)).await.unwrap());

    let held: Vec<_> = store.list().await.unwrap().into_iter()
        .filter(|l| l.lock_date == key.date_str())
        .collect();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].lock_scope, "09:00");
    assert_eq!(held[0].booking_id, "first");

    store.force_delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_delete_only_removes_own_lock() {
    let store = store().await;
    let key = fresh_key();
    assert!(store.try_insert(&key, "owner", Duration::seconds(30)).await.unwrap());

    assert!(!store.delete(&key, "intruder").await.unwrap());
    assert!(!store.try_insert(&key, "intruder", Duration::seconds(30)).await.unwrap());

    assert!(store.delete(&key, "owner").await.unwrap());
    assert!(!store.delete(&key, "owner").await.unwrap());
    assert!(store.try_insert(&key, "intruder", Duration::seconds(30)).await.unwrap());

    store.force_delete(&key).await.unwrap();
    store.force_delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a Redis server at REDIS_URL"]
async fn test_expired_key_can_be_taken() {
    let store = store().await;
    let key = fresh_key();

    assert!(store.try_insert(&key, "crashed", Duration::milliseconds(200)).await.unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    assert!(store.try_insert(&key, "fresh", Duration::seconds(30)).await.unwrap());
    assert_eq!(store.purge_expired().await.unwrap(), 0);
    store.force_delete(&key).await.unwrap();
}
