use axum::{extract::{State, Path, Query}, response::IntoResponse, Json};
use crate::state::AppState;
use crate::api::dtos::requests::{parse_date, DatesQuery, SlotSelectionRequest, SlotsQuery};
use crate::api::dtos::responses::{BookingSummary, ConfirmationResponse};
use crate::domain::models::booking::Booking;
use crate::domain::services::scheduler::ScheduledBooking;
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

fn summary(state: &AppState, booking: &Booking) -> BookingSummary {
    BookingSummary::new(booking, state.scheduler.zones().display_name(booking.zone))
}

fn confirmation(state: &AppState, scheduled: ScheduledBooking) -> ConfirmationResponse {
    ConfirmationResponse {
        booking: summary(state, &scheduled.booking),
        message: scheduled.message,
    }
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.scheduler.get_by_token(&token).await?;
    Ok(Json(summary(&state, &booking)))
}

pub async fn list_dates(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Query(query): Query<DatesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let dates = state.scheduler.list_dates(&token, query.reschedule).await?;
    Ok(Json(dates))
}

pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date = parse_date(&query.date)?;
    let slots = state.scheduler.list_slots(&token, date).await?;
    Ok(Json(slots))
}

pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<SlotSelectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (date, time) = payload.parse()?;
    let scheduled = state.scheduler.confirm(&token, date, time).await?;
    info!("Booking {} confirmed by tenant", scheduled.booking.id);
    Ok(Json(confirmation(&state, scheduled)))
}

pub async fn reschedule(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(payload): Json<SlotSelectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (date, time) = payload.parse()?;
    let scheduled = state.scheduler.reschedule(&token, date, time).await?;
    info!("Booking {} rescheduled by tenant", scheduled.booking.id);
    Ok(Json(confirmation(&state, scheduled)))
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let booking = state.scheduler.cancel_by_token(&token).await?;
    info!("Booking {} cancelled via access token", booking.id);
    Ok(Json(summary(&state, &booking)))
}
