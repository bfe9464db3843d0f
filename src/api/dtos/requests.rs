use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::domain::models::booking::BookingStatus;
use crate::domain::models::zone::ServiceZone;
use crate::domain::ports::BookingFilter;
use crate::domain::services::scheduler::CreateBookingInput;
use crate::error::AppError;

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid date, expected YYYY-MM-DD".into()))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::Validation("Invalid time, expected HH:MM".into()))
}

#[derive(Deserialize)]
pub struct SlotSelectionRequest {
    pub date: String,
    pub time: String,
}

impl SlotSelectionRequest {
    pub fn parse(&self) -> Result<(NaiveDate, NaiveTime), AppError> {
        Ok((parse_date(&self.date)?, parse_time(&self.time)?))
    }
}

#[derive(Deserialize)]
pub struct DatesQuery {
    #[serde(default)]
    pub reschedule: bool,
}

#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
}

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub invoice_id: String,
    #[serde(default)]
    pub line_item_index: i32,
    pub property_address: String,
    #[serde(default = "one")]
    pub unit_count: i32,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub tenant_email: Option<String>,
    pub landlord_name: String,
    pub landlord_email: String,
    #[serde(default = "one_time")]
    pub frequency: String,
}

fn one() -> i32 {
    1
}

fn one_time() -> String {
    "one_time".to_string()
}

impl From<CreateBookingRequest> for CreateBookingInput {
    fn from(req: CreateBookingRequest) -> Self {
        Self {
            invoice_id: req.invoice_id,
            line_item_index: req.line_item_index,
            property_address: req.property_address,
            unit_count: req.unit_count,
            tenant_name: req.tenant_name,
            tenant_phone: req.tenant_phone,
            tenant_email: req.tenant_email,
            landlord_name: req.landlord_name,
            landlord_email: req.landlord_email,
            frequency: req.frequency,
        }
    }
}

#[derive(Deserialize, Default)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub zone: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl BookingListQuery {
    pub fn to_filter(&self) -> Result<BookingFilter, AppError> {
        let status = self.status.as_deref()
            .map(|s| s.parse::<BookingStatus>().map_err(AppError::Validation))
            .transpose()?;
        let zone = self.zone.as_deref()
            .map(|z| z.parse::<ServiceZone>().map_err(AppError::Validation))
            .transpose()?;
        let from = self.from.as_deref().map(parse_date).transpose()?;
        let to = self.to.as_deref().map(parse_date).transpose()?;

        if let (Some(from), Some(to)) = (from, to) && from > to {
            return Err(AppError::Validation("'from' must not be after 'to'".into()));
        }
        Ok(BookingFilter { status, zone, from, to })
    }
}
