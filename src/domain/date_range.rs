// Inclusive calendar-date window
use super::time_basis::TimeBasis;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

pub const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("range start {start} is after end {end}")]
    Inverted { start: String, end: String },
}

/// Inclusive `[start, end]` window of calendar days.
///
/// Bounds are kept in their fixed-width, zero-padded `YYYY-MM-DD` form so
/// that membership is a plain lexicographic comparison against a document's
/// `day` string. Any change to the day representation must keep that form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: String,
    end: String,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted {
                start: start.format(DAY_FORMAT).to_string(),
                end: end.format(DAY_FORMAT).to_string(),
            });
        }
        Ok(Self {
            start: start.format(DAY_FORMAT).to_string(),
            end: end.format(DAY_FORMAT).to_string(),
        })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, DateRangeError> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    /// Window covering the calendar days of two instants.
    pub fn from_span(first: i64, last: i64, basis: TimeBasis) -> Option<Self> {
        let start = basis.calendar_date(first.min(last))?;
        let end = basis.calendar_date(first.max(last))?;
        Self::new(start, end).ok()
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn contains_day(&self, day: &str) -> bool {
        day >= self.start.as_str() && day <= self.end.as_str()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains_day(&date.format(DAY_FORMAT).to_string())
    }

    /// Whether the instant falls on a day inside the window in `basis`.
    pub fn contains_instant(&self, unix_seconds: i64, basis: TimeBasis) -> bool {
        basis
            .calendar_date(unix_seconds)
            .is_some_and(|date| self.contains_date(date))
    }
}

pub fn parse_day(value: &str) -> Result<NaiveDate, DateRangeError> {
    // %Y would also accept unpadded years, which would break string ordering
    let trimmed = value.trim();
    if trimmed.len() != 10 {
        return Err(DateRangeError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DAY_FORMAT)
        .map_err(|_| DateRangeError::InvalidDate(value.to_string()))
}
