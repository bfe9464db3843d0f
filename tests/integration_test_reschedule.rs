mod common;

use axum::http::StatusCode;
use chrono::{Duration, NaiveTime, Timelike, Utc};
use common::{days_ahead, TestApp, ZONE_A_ADDRESS};
use inspection_scheduler::domain::models::notification::NotificationKind;

#[tokio::test]
async fn test_third_reschedule_hits_the_limit() {
    let app = TestApp::new().await;
    let (id, token) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;
    let date = days_ahead(7);
    assert_eq!(app.confirm(&token, date, "09:00").await.0, StatusCode::OK);

    let (status, body) = app.reschedule(&token, date, "11:00").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["booking"]["reschedules_left"], 1);
    assert!(body["message"].as_str().unwrap().contains("1 more time:"));

    let (status, body) = app.reschedule(&token, days_ahead(8), "14:00").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["booking"]["reschedules_left"], 0);
    assert_eq!(body["booking"]["scheduled_date"], days_ahead(8).to_string());

    let (status, body) = app.reschedule(&token, days_ahead(9), "10:00").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "reschedule_limit");

    let stored = app.booking(&id).await;
    assert_eq!(stored.reschedule_count, 2);
    assert_eq!(stored.scheduled_time, NaiveTime::from_hms_opt(14, 0, 0));
    assert_eq!(app.notifier.count(&id, NotificationKind::Reschedule), 4);

    let (status, body) = app.get(&format!("/api/v1/bookings/{}/dates?reschedule=true", token)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "reschedule_limit");
}

#[tokio::test]
async fn test_reschedule_frees_the_old_slot() {
    let app = TestApp::new().await;
    let (id, token) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;
    let date = days_ahead(6);
    app.confirm(&token, date, "09:00").await;

    let (status, _) = app.reschedule(&token, date, "15:00").await;
    assert_eq!(status, StatusCode::OK);

    // The calendar event is updated in place.
    let upserts = app.calendar.upserts.lock().unwrap().clone();
    assert_eq!(upserts.len(), 2);
    assert_eq!(upserts[1].0.as_deref(), Some(format!("evt-{}", id).as_str()));

    let (_, other) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;
    let (status, body) = app.confirm(&other, date, "09:00").await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (_, locks) = app.admin("GET", "/api/v1/admin/locks", None).await;
    assert!(locks.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reschedule_to_same_slot_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;
    let date = days_ahead(6);
    app.confirm(&token, date, "09:00").await;

    let (status, _) = app.reschedule(&token, date, "09:00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pending_booking_cannot_be_rescheduled() {
    let app = TestApp::new().await;
    let (_, token) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;

    let (status, body) = app.reschedule(&token, days_ahead(6), "09:00").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "pending_tenant");
}

#[tokio::test]
async fn test_current_appointment_within_notice_cannot_move() {
    let app = TestApp::new().await;
    let soon = Utc::now() + Duration::hours(3);
    let seeded = app.seed_scheduled(
        ZONE_A_ADDRESS,
        soon.date_naive(),
        NaiveTime::from_hms_opt(soon.hour(), 0, 0).unwrap(),
    ).await;

    let (status, body) = app.reschedule(&seeded.access_token, days_ahead(7), "10:00").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "current_within_notice");

    let (status, body) = app.get(&format!("/api/v1/bookings/{}/dates?reschedule=true", seeded.access_token)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "current_within_notice");
}

#[tokio::test]
async fn test_new_time_within_notice_is_rejected() {
    let app = TestApp::new().await;
    let (id, token) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;
    app.confirm(&token, days_ahead(7), "10:00").await;

    let soon = Utc::now() + Duration::hours(2);
    let time = format!("{:02}:00", soon.hour());
    let (status, body) = app.reschedule(&token, soon.date_naive(), &time).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "new_within_notice");

    assert_eq!(app.booking(&id).await.reschedule_count, 0);
}

#[tokio::test]
async fn test_failed_reschedule_keeps_current_appointment() {
    let app = TestApp::new().await;
    let date = days_ahead(7);
    app.seed_scheduled(ZONE_A_ADDRESS, date, NaiveTime::from_hms_opt(12, 0, 0).unwrap()).await;

    let (id, token) = app.create_booking(ZONE_A_ADDRESS, "one_time").await;
    app.confirm(&token, date, "09:00").await;

    let (status, body) = app.reschedule(&token, date, "12:00").await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let stored = app.booking(&id).await;
    assert_eq!(stored.scheduled_time, NaiveTime::from_hms_opt(9, 0, 0));
    assert_eq!(stored.reschedule_count, 0);

    // Its own slot is not reported as taken when picking a new time.
    let (_, slots) = app.get(&format!("/api/v1/bookings/{}/slots?date={}", token, date)).await;
    let nine = slots.as_array().unwrap().iter().find(|s| s["start"] == "09:00").unwrap().clone();
    assert_eq!(nine["available"], true);
}
