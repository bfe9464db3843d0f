use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::domain::models::booking::BookingStatus;

/// Specific reason behind a `PolicyViolation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyReason {
    ZoneRestricted,
    DayFull,
    MinNotice,
    BlockedDate,
    OutsideBookingWindow,
    RescheduleLimit,
    CurrentWithinNotice,
    NewWithinNotice,
}

impl PolicyReason {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyReason::ZoneRestricted => "zone_restricted",
            PolicyReason::DayFull => "day_full",
            PolicyReason::MinNotice => "min_notice",
            PolicyReason::BlockedDate => "blocked_date",
            PolicyReason::OutsideBookingWindow => "outside_booking_window",
            PolicyReason::RescheduleLimit => "reschedule_limit",
            PolicyReason::CurrentWithinNotice => "current_within_notice",
            PolicyReason::NewWithinNotice => "new_within_notice",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PolicyReason::ZoneRestricted => "Inspections in your area are not offered on this day.",
            PolicyReason::DayFull => "This day is fully booked.",
            PolicyReason::MinNotice => "This time is too soon to book.",
            PolicyReason::BlockedDate => "No inspections are available on this date.",
            PolicyReason::OutsideBookingWindow => "This date is outside the booking window.",
            PolicyReason::RescheduleLimit => "This inspection has already been rescheduled the maximum number of times.",
            PolicyReason::CurrentWithinNotice => "Your current appointment is too close to be rescheduled.",
            PolicyReason::NewWithinNotice => "The new time is too soon to book.",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Invalid state: booking is {status}")]
    InvalidState { status: BookingStatus },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Policy violation: {}", .0.code())]
    PolicyViolation(PolicyReason),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

impl AppError {
    pub fn slot_taken() -> Self {
        AppError::Conflict("This time was just booked by someone else. Please pick another slot.".into())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Upstream(format!("Lock store error: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = match &self {
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal server error" }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::InvalidState { status } => (
                StatusCode::CONFLICT,
                json!({ "error": format!("This booking is {} and cannot be changed this way.", status.label()), "status": status }),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg, "retryable": true })),
            AppError::PolicyViolation(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": reason.message(), "reason": reason.code() }),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            AppError::Upstream(msg) => {
                error!("Upstream failure: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Something went wrong, please try again later." }))
            }
            AppError::InternalWithMsg(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal error" }))
            }
        };

        let (status, payload) = body;
        (status, Json(payload)).into_response()
    }
}
