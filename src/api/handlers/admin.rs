use axum::{extract::{State, Path, Query}, http::StatusCode, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::extractors::admin::AdminUser;
use crate::api::dtos::requests::{BookingListQuery, CreateBookingRequest};
use crate::api::dtos::responses::CreatedBookingResponse;
use crate::domain::models::schedule::AvailabilitySchedule;
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.scheduler.create_booking(payload.into()).await?;
    info!("Booking {} created by {}", booking.id, admin);
    let booking_link = state.scheduler.manage_link(&booking);
    Ok((StatusCode::CREATED, Json(CreatedBookingResponse { booking, booking_link })))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<BookingListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = state.scheduler.list_bookings(&query.to_filter()?).await?;
    Ok(Json(bookings))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.scheduler.get_by_id(&booking_id).await?))
}

pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.scheduler.complete(&booking_id).await?;
    info!("Booking {} completed by {}", booking_id, admin);
    Ok(Json(booking))
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.scheduler.cancel(&booking_id).await?;
    info!("Booking {} cancelled by {}", booking_id, admin);
    Ok(Json(booking))
}

pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.scheduler.mark_no_show(&booking_id).await?;
    info!("Booking {} marked no-show by {}", booking_id, admin);
    Ok(Json(booking))
}

pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.scheduler.get_schedule().await?))
}

pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<AvailabilitySchedule>,
) -> Result<impl IntoResponse, AppError> {
    let saved = state.scheduler.update_schedule(payload).await?;
    info!("Schedule version {} saved by {}", saved.version, admin);
    Ok(Json(saved))
}

pub async fn list_locks(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.scheduler.list_locks().await?))
}

pub async fn release_lock(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path((date, scope)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state.scheduler.release_lock(&date, &scope).await?;
    info!("Lock {} {} released by {}", date, scope, admin);
    Ok(StatusCode::NO_CONTENT)
}
