pub mod booking_machine;
pub mod calendar;
pub mod lock_manager;
pub mod messages;
pub mod policy;
pub mod scheduler;
pub mod slots;
pub mod zones;
