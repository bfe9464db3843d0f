use axum::{
    body::Body,
    extract::Request,
    routing::{get, post, delete},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{health, inspection, admin};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Tenant booking flow, authorized by the access token in the link
        .route("/api/v1/bookings/{token}", get(inspection::get_booking))
        .route("/api/v1/bookings/{token}/dates", get(inspection::list_dates))
        .route("/api/v1/bookings/{token}/slots", get(inspection::list_slots))
        .route("/api/v1/bookings/{token}/confirm", post(inspection::confirm))
        .route("/api/v1/bookings/{token}/reschedule", post(inspection::reschedule))
        .route("/api/v1/bookings/{token}/cancel", post(inspection::cancel))

        // Admin
        .route("/api/v1/admin/bookings", post(admin::create_booking).get(admin::list_bookings))
        .route("/api/v1/admin/bookings/{booking_id}", get(admin::get_booking))
        .route("/api/v1/admin/bookings/{booking_id}/complete", post(admin::complete_booking))
        .route("/api/v1/admin/bookings/{booking_id}/cancel", post(admin::cancel_booking))
        .route("/api/v1/admin/bookings/{booking_id}/no-show", post(admin::mark_no_show))
        .route("/api/v1/admin/schedule", get(admin::get_schedule).put(admin::update_schedule))
        .route("/api/v1/admin/locks", get(admin::list_locks))
        .route("/api/v1/admin/locks/{date}/{scope}", delete(admin::release_lock))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        user_id = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .with_state(state)
}
