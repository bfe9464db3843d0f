pub mod sqlite_booking_repo;
pub mod sqlite_schedule_repo;
pub mod sqlite_lock_repo;

pub mod postgres_booking_repo;
pub mod postgres_schedule_repo;
pub mod postgres_lock_repo;

pub mod redis_lock_store;
