pub mod booking;
pub mod lock;
pub mod notification;
pub mod schedule;
pub mod slot;
pub mod zone;
