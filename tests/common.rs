#![allow(dead_code)]

use inspection_scheduler::{
    api::{extractors::admin::AdminClaims, router::create_router},
    config::Config,
    domain::models::booking::{Booking, BookingStatus, InspectionFrequency, NewBookingParams},
    domain::models::notification::{CalendarAppointment, Notification, NotificationKind},
    domain::models::schedule::{AvailabilitySchedule, TimeWindow, Weekly},
    domain::models::zone::{PostalRule, ServiceZone, TravelEdge, ZoneConfig, ZoneDefinition},
    domain::ports::{BookingRepository, CalendarMirror, NotificationGateway},
    domain::services::zones::ZoneClassifier,
    error::AppError,
    infra::factory::{build_state, sqlite_stores},
    infra::repositories::sqlite_booking_repo::SqliteBookingRepo,
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use sqlx::{sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions}, Pool, Sqlite};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_SECRET: &str = "test-admin-secret";
pub const ZONE_A_ADDRESS: &str = "1 Main St, Springfield, CA 94110";
pub const ZONE_B_ADDRESS: &str = "9 Oak Ave, Springfield, CA 94115";

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn count(&self, booking_id: &str, kind: NotificationKind) -> usize {
        self.sent.lock().unwrap().iter()
            .filter(|n| n.booking_id == booking_id && n.kind == kind)
            .count()
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCalendar {
    pub upserts: Mutex<Vec<(Option<String>, CalendarAppointment)>>,
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl CalendarMirror for RecordingCalendar {
    async fn upsert(&self, event_id: Option<&str>, appointment: &CalendarAppointment) -> Result<String, AppError> {
        self.upserts.lock().unwrap().push((event_id.map(str::to_string), appointment.clone()));
        Ok(event_id.map(str::to_string).unwrap_or_else(|| format!("evt-{}", appointment.booking_id)))
    }

    async fn remove(&self, event_id: &str) -> Result<(), AppError> {
        self.removed.lock().unwrap().push(event_id.to_string());
        Ok(())
    }
}

/// Two zones; same-zone visits can run back to back, A and B are 45 minutes apart.
pub fn test_zones() -> ZoneClassifier {
    use ServiceZone::*;
    ZoneClassifier::new(ZoneConfig {
        zones: vec![
            ZoneDefinition { zone: A, name: "Downtown".into(), rules: vec![PostalRule::Range { from: 94102, to: 94112 }] },
            ZoneDefinition { zone: B, name: "North Side".into(), rules: vec![PostalRule::Range { from: 94113, to: 94129 }] },
        ],
        travel: vec![
            TravelEdge { from: A, to: A, minutes: 0 },
            TravelEdge { from: B, to: B, minutes: 0 },
            TravelEdge { from: A, to: B, minutes: 45 },
            TravelEdge { from: B, to: A, minutes: 45 },
        ],
        fallback_minutes: 75,
    })
}

/// Open 08:00-17:00 in hourly slots on every day of the week.
pub fn open_every_day() -> AvailabilitySchedule {
    let window = || Some(TimeWindow { start: "08:00".into(), end: "17:00".into(), slot_duration_min: 60 });
    AvailabilitySchedule {
        timezone: "UTC".into(),
        hours: Weekly {
            monday: window(),
            tuesday: window(),
            wednesday: window(),
            thursday: window(),
            friday: window(),
            saturday: window(),
            sunday: window(),
        },
        ..AvailabilitySchedule::default()
    }
}

/// Nested objects are merged key by key; anything else replaces the target.
pub fn merge(target: &mut Value, overrides: Value) {
    match (target, overrides) {
        (Value::Object(target), Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, value) => *target = value,
    }
}

pub fn days_ahead(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

pub fn weekday_key(date: NaiveDate) -> String {
    date.format("%A").to_string().to_lowercase()
}

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
    pub calendar: Arc<RecordingCalendar>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let config = Config {
            database_url: db_url.clone(),
            port: 0,
            lock_store_url: None,
            notify_service_url: None,
            notify_service_token: String::new(),
            calendar_service_url: None,
            frontend_url: "https://app.example.com".to_string(),
            admin_jwt_secret: ADMIN_SECRET.to_string(),
            zones_file: None,
            slot_lock_ttl_secs: 30,
            store_timeout_ms: 10_000,
            booking_link_ttl_days: 30,
            maintenance_interval_secs: 60,
        };

        let notifier = Arc::new(RecordingNotifier::default());
        let calendar = Arc::new(RecordingCalendar::default());

        let state = build_state(&config, sqlite_stores(pool.clone()), test_zones(), notifier.clone(), calendar.clone())
            .expect("Failed to build state");
        let state = Arc::new(state);

        state.scheduler.update_schedule(open_every_day()).await
            .expect("Failed to store test schedule");

        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            notifier,
            calendar,
        }
    }

    pub fn admin_token(&self) -> String {
        self.token_with(ADMIN_SECRET, "admin")
    }

    pub fn token_with(&self, secret: &str, role: &str) -> String {
        let claims = AdminClaims {
            sub: "ops@example.com".to_string(),
            role: role.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body), None).await
    }

    pub async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin_token();
        self.send(method, uri, body, Some(&token)).await
    }

    /// Creates a booking through the admin API and returns `(id, access_token)`.
    pub async fn create_booking(&self, address: &str, frequency: &str) -> (String, String) {
        let (status, body) = self.admin("POST", "/api/v1/admin/bookings", Some(serde_json::json!({
            "invoice_id": format!("inv-{}", Uuid::new_v4()),
            "property_address": address,
            "tenant_name": "Tess Tenant",
            "tenant_phone": "+15550100",
            "tenant_email": "tess@example.com",
            "landlord_name": "Lou Landlord",
            "landlord_email": "lou@example.com",
            "frequency": frequency,
        }))).await;
        assert_eq!(status, StatusCode::CREATED, "create booking failed: {}", body);

        let id = body["booking"]["id"].as_str().unwrap().to_string();
        let token = body["booking"]["access_token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Merges `overrides` into the stored schedule and saves it.
    pub async fn configure(&self, overrides: Value) {
        let (_, mut schedule) = self.admin("GET", "/api/v1/admin/schedule", None).await;
        merge(&mut schedule, overrides);
        let (status, body) = self.admin("PUT", "/api/v1/admin/schedule", Some(schedule)).await;
        assert_eq!(status, StatusCode::OK, "schedule update failed: {}", body);
    }

    pub async fn confirm(&self, token: &str, date: NaiveDate, time: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/v1/bookings/{}/confirm", token),
            serde_json::json!({ "date": date.to_string(), "time": time }),
        ).await
    }

    pub async fn reschedule(&self, token: &str, date: NaiveDate, time: &str) -> (StatusCode, Value) {
        self.post(
            &format!("/api/v1/bookings/{}/reschedule", token),
            serde_json::json!({ "date": date.to_string(), "time": time }),
        ).await
    }

    /// Writes a scheduled booking straight to the store, bypassing the booking window.
    pub async fn seed_scheduled(&self, address: &str, date: NaiveDate, time: NaiveTime) -> Booking {
        let (postal_code, zone) = self.state.scheduler.zones().classify_address(address);
        let mut booking = Booking::new(NewBookingParams {
            invoice_id: format!("inv-{}", Uuid::new_v4()),
            line_item_index: 0,
            property_address: address.to_string(),
            postal_code,
            zone,
            unit_count: 1,
            tenant_name: "Seeded Tenant".into(),
            tenant_phone: "+15550199".into(),
            tenant_email: None,
            landlord_name: "Lou Landlord".into(),
            landlord_email: "lou@example.com".into(),
            frequency: InspectionFrequency::OneTime,
        });
        booking.status = BookingStatus::Scheduled;
        booking.scheduled_date = Some(date);
        booking.scheduled_time = Some(time);
        booking.duration_min = Some(60);

        SqliteBookingRepo::new(self.pool.clone()).create(&booking).await.unwrap()
    }

    pub async fn booking(&self, id: &str) -> Booking {
        self.state.scheduler.get_by_id(id).await.unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}
