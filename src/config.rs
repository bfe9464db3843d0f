use std::env;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Separate lock store (`redis://...`); locks live in the database when unset.
    pub lock_store_url: Option<String>,
    pub notify_service_url: Option<String>,
    pub notify_service_token: String,
    pub calendar_service_url: Option<String>,
    pub frontend_url: String,
    pub admin_jwt_secret: String,
    pub zones_file: Option<String>,
    pub slot_lock_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub booking_link_ttl_days: i64,
    pub maintenance_interval_secs: u64,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn number<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|_| AppError::InternalWithMsg(format!("{} must be a number", name))),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: optional("DATABASE_URL").ok_or(AppError::InternalWithMsg("DATABASE_URL must be set".into()))?,
            port: number("PORT", 3000)?,
            lock_store_url: optional("LOCK_STORE_URL"),
            notify_service_url: optional("NOTIFY_SERVICE_URL"),
            notify_service_token: optional("NOTIFY_SERVICE_TOKEN").unwrap_or_default(),
            calendar_service_url: optional("CALENDAR_SERVICE_URL"),
            frontend_url: optional("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            admin_jwt_secret: optional("ADMIN_JWT_SECRET").ok_or(AppError::InternalWithMsg("ADMIN_JWT_SECRET must be set".into()))?,
            zones_file: optional("ZONES_FILE"),
            slot_lock_ttl_secs: number("SLOT_LOCK_TTL_SECS", 30)?,
            store_timeout_ms: number("STORE_TIMEOUT_MS", 3000)?,
            booking_link_ttl_days: number("BOOKING_LINK_TTL_DAYS", 30)?,
            maintenance_interval_secs: number("MAINTENANCE_INTERVAL_SECS", 60)?,
        })
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}
