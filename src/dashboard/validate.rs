//! Input checks shared by the store operations.

use anyhow::Result;
use chrono::NaiveDate;

use crate::errors::DashboardError;

/// Date format used for due dates, report dates and birthdays.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trim `value` and fail with "<field> is required." when nothing is left.
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::validation(format!("{} is required.", field)).into());
    }
    Ok(trimmed.to_string())
}

/// Names of the fields in `fields` that are blank.
pub fn missing_fields<'a>(fields: &[(&'a str, &str)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

/// Parse a `YYYY-MM-DD` date and return it normalised.
pub fn parse_date(field: &str, value: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        DashboardError::validation(format!("{} must be a date in YYYY-MM-DD format.", field))
    })?;
    Ok(date.format(DATE_FORMAT).to_string())
}

/// Today's date in UTC as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Utc::now().date_naive().format(DATE_FORMAT).to_string()
}
