//! Field-level validation rules for overtime requests, delegations and
//! entity natural keys. All checks are pure apart from reading the clock.

use chrono::{NaiveDate, NaiveTime, Utc};

use crate::error::{AppError, AppResult};

/// Maximum length of a single overtime shift.
pub const MAX_SHIFT_MINUTES: i64 = 12 * 60;

/// Server-local "today", taken as the current UTC date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A time range must be strictly increasing.
pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> AppResult<()> {
    if end <= start {
        return Err(AppError::bad_request(
            "end time must be after start time",
        ));
    }
    Ok(())
}

/// A date range may be a single day, so equality is allowed. This is looser
/// than the time-range rule on purpose.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if end < start {
        return Err(AppError::bad_request(
            "end date must not be before start date",
        ));
    }
    Ok(())
}

pub fn validate_request_date(request_date: NaiveDate) -> AppResult<()> {
    if request_date < today() {
        return Err(AppError::bad_request(
            "request date cannot be in the past",
        ));
    }
    Ok(())
}

/// Checks the time range and caps the shift at twelve hours. Times are
/// same-day only; an end time past midnight is not representable here.
pub fn validate_working_hours(start: NaiveTime, end: NaiveTime) -> AppResult<()> {
    validate_time_range(start, end)?;

    let duration_minutes = (end - start).num_minutes();
    if duration_minutes > MAX_SHIFT_MINUTES {
        return Err(AppError::bad_request(
            "working duration cannot exceed 12 hours",
        ));
    }
    Ok(())
}

pub fn validate_employee_number_format(employee_number: &str) -> AppResult<()> {
    if employee_number.len() < 3 {
        return Err(AppError::bad_request(
            "employee number must be at least 3 characters",
        ));
    }
    Ok(())
}

pub fn validate_service_code_format(service_code: &str) -> AppResult<()> {
    if service_code.len() < 2 {
        return Err(AppError::bad_request(
            "service code must be at least 2 characters",
        ));
    }
    if !service_code.chars().all(char::is_alphanumeric) {
        return Err(AppError::bad_request(
            "service code may only contain letters and digits",
        ));
    }
    Ok(())
}
