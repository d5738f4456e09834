//! Admin API handlers grouped by resource.
//!
//! Error conversions and date resolution shared by the handlers live here.

mod content;
mod health;
mod schedule;

pub use content::*;
pub use health::*;
pub use schedule::*;

use axum::http::StatusCode;
use time::{Date, OffsetDateTime};

use crate::application::pool::PoolAdminError;
use crate::application::repos::RepoError;
use crate::application::schedule::{ScheduleError, SlotCalendar};
use crate::domain::error::DomainError;
use crate::util::parse_iso_date;

use super::error::{ApiError, codes};

/// Parse `raw` as `YYYY-MM-DD`, defaulting to today in the posting timezone.
pub(crate) fn resolve_date(raw: Option<&str>, calendar: &SlotCalendar) -> Result<Date, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_iso_date(value).map_err(|err| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_DATE,
                "Date must be YYYY-MM-DD",
                Some(format!("`{value}`: {err}")),
            )
        }),
        None => calendar
            .today(OffsetDateTime::now_utc())
            .map_err(|err| schedule_to_api(err.into())),
    }
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

pub(crate) fn schedule_to_api(err: ScheduleError) -> ApiError {
    match err {
        ScheduleError::Repo(repo) => repo_to_api(repo),
        ScheduleError::Timezone(tz) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_DATE,
            "Date cannot be placed on the posting calendar",
            Some(tz.to_string()),
        ),
        ScheduleError::InvalidSpan { requested, max } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid refill span",
            Some(format!("days must be between 1 and {max}, got {requested}")),
        ),
        ScheduleError::Domain(DomainError::Validation { message }) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        ScheduleError::Domain(DomainError::NotFound { entity }) => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found",
            Some(entity.to_string()),
        ),
        ScheduleError::Domain(DomainError::Invariant { message }) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::SCHEDULE,
            "Schedule invariant violated",
            Some(message),
        ),
        ScheduleError::SlotNotFound => ApiError::not_found("slot not found"),
        ScheduleError::SlotNotPending(status) => ApiError::new(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "Slot no longer accepts an outcome",
            Some(format!("slot is {status}")),
        ),
    }
}

pub(crate) fn pool_to_api(err: PoolAdminError) -> ApiError {
    match err {
        PoolAdminError::Repo(repo) => repo_to_api(repo),
    }
}
