//! ISO calendar-date helpers.

use chrono::{Days, NaiveDate, Utc};

use crate::error::ValidationError;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Format as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

/// The date `days_offset` days before `from`.
pub fn relative_date(from: NaiveDate, days_offset: u64) -> NaiveDate {
    from.checked_sub_days(Days::new(days_offset)).unwrap_or(NaiveDate::MIN)
}

/// The date `days_offset` days after `from`.
pub fn future_date(from: NaiveDate, days_offset: u64) -> NaiveDate {
    from.checked_add_days(Days::new(days_offset)).unwrap_or(NaiveDate::MAX)
}

/// The `count` calendar days following `anchor`, in order.
pub fn following_days(anchor: NaiveDate, count: u64) -> Vec<NaiveDate> {
    (1..=count).map(|i| future_date(anchor, i)).collect()
}
