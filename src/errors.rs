use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use thiserror::Error;

use crate::models::SeatingCategory;
use crate::rules::TableBucket;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{message}")]
    InvalidField { field: &'static str, message: String },

    #[error("{0}")]
    SlotUnavailable(String),

    #[error("You already have a booking on {date} at {time}. Submit again with confirm_duplicate to book anyway.")]
    DuplicateBooking { date: NaiveDate, time: NaiveTime },

    #[error("{}", category_full_message(.category, .bucket))]
    CategoryFull {
        category: SeatingCategory,
        bucket: Option<TableBucket>,
    },

    #[error("For parties of 7 or 8, counter seating is required.")]
    SeatingPreferenceInvalid,

    #[error("Invalid or expired cancellation link.")]
    TokenNotFound,

    #[error("Reservation not found.")]
    NotFound,

    #[error("Not authorized.")]
    NotAuthorized,

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

fn category_full_message(category: &SeatingCategory, bucket: &Option<TableBucket>) -> String {
    match bucket {
        Some(b) => format!("All tables for {} are taken at your chosen time.", b.table_size()),
        None => format!("{} is fully booked at your chosen time.", category.label()),
    }
}

impl BookingError {
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidField { .. } => "INVALID_FIELD",
            BookingError::SlotUnavailable(_) => "SLOT_UNAVAILABLE",
            BookingError::DuplicateBooking { .. } => "DUPLICATE_BOOKING",
            BookingError::CategoryFull { .. } => "CATEGORY_FULL",
            BookingError::SeatingPreferenceInvalid => "SEATING_PREFERENCE_INVALID",
            BookingError::TokenNotFound => "TOKEN_NOT_FOUND",
            BookingError::NotFound => "NOT_FOUND",
            BookingError::NotAuthorized => "NOT_AUTHORIZED",
            BookingError::Database(_) | BookingError::Pool(_) => "DATABASE",
        }
    }
}

impl ResponseError for BookingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidField { .. }
            | BookingError::SlotUnavailable(_)
            | BookingError::SeatingPreferenceInvalid => StatusCode::BAD_REQUEST,
            BookingError::DuplicateBooking { .. } | BookingError::CategoryFull { .. } => {
                StatusCode::CONFLICT
            }
            BookingError::TokenNotFound | BookingError::NotFound => StatusCode::NOT_FOUND,
            BookingError::NotAuthorized => StatusCode::UNAUTHORIZED,
            BookingError::Database(_) | BookingError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            // don't leak database details to the client
            log::error!("request failed: {:?}", self);
            return HttpResponse::build(status).json(ErrorBody {
                code: self.code(),
                message: "Something went wrong on our side. Please try again.".to_string(),
                field: None,
            });
        }
        let field = match self {
            BookingError::InvalidField { field, .. } => Some(*field),
            _ => None,
        };
        HttpResponse::build(status).json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
            field,
        })
    }
}
