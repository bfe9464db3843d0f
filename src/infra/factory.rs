use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::error::AppError;
use crate::state::AppState;
use crate::domain::ports::{BookingRepository, CalendarMirror, NotificationGateway, ScheduleRepository, SlotLockStore};
use crate::domain::services::{
    lock_manager::SlotLockManager,
    messages::{load_templates, MessageComposer},
    scheduler::SchedulerService,
    zones::ZoneClassifier,
};
use crate::infra::calendar::http_calendar_mirror::{HttpCalendarMirror, NoopCalendarMirror};
use crate::infra::notify::http_notification_gateway::{HttpNotificationGateway, LogOnlyNotificationGateway};
use crate::infra::repositories::{
    postgres_booking_repo::PostgresBookingRepo, postgres_schedule_repo::PostgresScheduleRepo,
    postgres_lock_repo::PostgresLockRepo,
    sqlite_booking_repo::SqliteBookingRepo, sqlite_schedule_repo::SqliteScheduleRepo,
    sqlite_lock_repo::SqliteLockRepo,
    redis_lock_store::RedisLockStore,
};

/// The shared stores every instance coordinates through.
pub struct Stores {
    pub bookings: Arc<dyn BookingRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub locks: Arc<dyn SlotLockStore>,
}

pub fn sqlite_stores(pool: SqlitePool) -> Stores {
    Stores {
        bookings: Arc::new(SqliteBookingRepo::new(pool.clone())),
        schedules: Arc::new(SqliteScheduleRepo::new(pool.clone())),
        locks: Arc::new(SqliteLockRepo::new(pool)),
    }
}

pub fn postgres_stores(pool: PgPool) -> Stores {
    Stores {
        bookings: Arc::new(PostgresBookingRepo::new(pool.clone())),
        schedules: Arc::new(PostgresScheduleRepo::new(pool.clone())),
        locks: Arc::new(PostgresLockRepo::new(pool)),
    }
}

pub fn build_state(
    config: &Config,
    stores: Stores,
    zones: ZoneClassifier,
    notifier: Arc<dyn NotificationGateway>,
    calendar: Arc<dyn CalendarMirror>,
) -> Result<AppState, AppError> {
    let locks = SlotLockManager::new(
        stores.locks,
        chrono::Duration::seconds(config.slot_lock_ttl_secs as i64),
        config.store_timeout(),
    );
    let messages = MessageComposer::new(load_templates()?, config.frontend_url.clone());

    let scheduler = SchedulerService::new(
        stores.bookings,
        stores.schedules,
        locks,
        Arc::new(zones),
        notifier,
        calendar,
        messages,
    );

    Ok(AppState {
        config: config.clone(),
        scheduler: Arc::new(scheduler),
    })
}

pub async fn bootstrap_state(config: &Config) -> Result<AppState, AppError> {
    let database_url = &config.database_url;
    let timeout = config.store_timeout();

    let mut stores = if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse()
            .map_err(|e| AppError::InternalWithMsg(format!("Invalid Postgres URL: {}", e)))?;
        opts = opts.options([("statement_timeout", format!("{}", timeout.as_millis()))])
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(timeout)
            .connect_with(opts)
            .await?;

        run_postgres_migrations(&pool).await?;
        postgres_stores(pool)
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::InternalWithMsg(format!("Invalid SQLite connection string: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(timeout)
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect_with(opts)
            .await?;

        run_sqlite_migrations(&pool).await?;
        sqlite_stores(pool)
    };

    if let Some(url) = &config.lock_store_url {
        info!("Using Redis for slot locks");
        stores.locks = Arc::new(RedisLockStore::new(url).await?);
    }

    let zones = match &config.zones_file {
        Some(path) => {
            info!("Loading service zones from {}", path);
            ZoneClassifier::from_file(path)?
        }
        None => ZoneClassifier::default(),
    };

    let notifier: Arc<dyn NotificationGateway> = match &config.notify_service_url {
        Some(url) => Arc::new(HttpNotificationGateway::new(url.clone(), config.notify_service_token.clone(), timeout)?),
        None => Arc::new(LogOnlyNotificationGateway),
    };

    let calendar: Arc<dyn CalendarMirror> = match &config.calendar_service_url {
        Some(url) => Arc::new(HttpCalendarMirror::new(url.clone(), timeout)?),
        None => Arc::new(NoopCalendarMirror),
    };

    build_state(config, stores, zones, notifier, calendar)
}

async fn run_postgres_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Failed to run Postgres migrations: {}", e)))
}

async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .map_err(|e| AppError::InternalWithMsg(format!("Failed to run SQLite migrations: {}", e)))
}
