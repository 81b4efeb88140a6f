// Measurement parser - Raw daily documents to normalized readings
use crate::domain::date_range::parse_day;
use crate::domain::document::{RawDailyDocument, RawMeasurement};
use crate::domain::reading::{BatteryStatus, NormalizedReading};
use crate::domain::time_basis::TimeBasis;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

/// Why a single measurement was not turned into a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasurementError {
    #[error("no measurement at index {0}")]
    NotFound(usize),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a number: {value:?}")]
    NotNumeric { field: &'static str, value: String },
    #[error("malformed day {0:?}")]
    MalformedDay(String),
    #[error("malformed time of day {0:?}")]
    MalformedTime(String),
    #[error("local time {0} does not exist in the configured zone")]
    NonexistentLocalTime(NaiveDateTime),
}

/// Date-time layouts accepted when `ts` carries its own date.
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
/// Time-of-day layouts, combined with the document's `day`.
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// One step of the battery carry-forward fold.
///
/// Level and voltage are overwritten independently, and only by values the
/// document actually declares; an unparseable value keeps the previous one.
pub fn carry_battery_forward(current: BatteryStatus, document: &RawDailyDocument) -> BatteryStatus {
    BatteryStatus {
        level: declared(document, "battery_level", document.battery_level.as_deref())
            .or(current.level),
        voltage: declared(document, "battery_voltage", document.battery_voltage.as_deref())
            .or(current.voltage),
    }
}

/// Battery values declared by this document alone.
pub fn declared_battery(document: &RawDailyDocument) -> BatteryStatus {
    carry_battery_forward(BatteryStatus::default(), document)
}

fn declared(document: &RawDailyDocument, field: &str, raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
    });
    if parsed.is_none() {
        tracing::warn!(
            "Ignoring unparseable {} {:?} on {} for tag {}",
            field,
            raw,
            document.day,
            document.tag_id
        );
    }
    parsed
}

/// Parse every measurement of `document`, tagging readings with `battery`.
///
/// Invalid measurements are dropped with a diagnostic; they never abort the
/// document. Output follows the document's array order.
pub fn parse_document(
    document: &RawDailyDocument,
    battery: BatteryStatus,
    basis: TimeBasis,
) -> Vec<NormalizedReading> {
    document
        .measurements
        .iter()
        .enumerate()
        .filter_map(|(index, measurement)| {
            match parse_measurement(document, measurement, battery, basis) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    tracing::warn!(
                        "Dropping measurement {} of {} for tag {}: {}",
                        index,
                        document.day,
                        document.tag_id,
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

/// Convert the measurement at `index` on its own, with the battery values
/// the document itself declares.
pub fn reading_at(
    document: &RawDailyDocument,
    index: usize,
    basis: TimeBasis,
) -> Result<NormalizedReading, MeasurementError> {
    let measurement = document
        .measurements
        .get(index)
        .ok_or(MeasurementError::NotFound(index))?;
    parse_measurement(document, measurement, declared_battery(document), basis)
}

pub fn parse_measurement(
    document: &RawDailyDocument,
    measurement: &RawMeasurement,
    battery: BatteryStatus,
    basis: TimeBasis,
) -> Result<NormalizedReading, MeasurementError> {
    let ts = required(measurement.ts.as_deref(), "ts")?;
    let t = required(measurement.t.as_deref(), "t")?;
    let h = required(measurement.h.as_deref(), "h")?;

    let temperature = parse_value("t", t)?;
    let humidity = parse_value("h", h)?;
    let timestamp = parse_timestamp(&document.day, ts, basis)?;

    Ok(NormalizedReading {
        tag_id: document.tag_id.clone(),
        timestamp,
        temperature,
        humidity,
        battery_level: battery.level,
        battery_voltage: battery.voltage,
    })
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, MeasurementError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MeasurementError::MissingField(field)),
    }
}

fn parse_value(field: &'static str, raw: &str) -> Result<f64, MeasurementError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MeasurementError::NotNumeric {
            field,
            value: raw.to_string(),
        })
}

/// Combine a document day and a measurement time into unix seconds.
///
/// The pair is a wall-clock value in `basis`; no UTC shift is applied. A `ts`
/// that is itself a full date-time overrides `day`, and one with an explicit
/// offset is taken as that absolute instant. Sub-second parts are dropped.
pub fn parse_timestamp(day: &str, ts: &str, basis: TimeBasis) -> Result<i64, MeasurementError> {
    let ts = ts.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(ts) {
        return Ok(instant.timestamp());
    }

    let wall_clock = match DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(ts, format).ok())
    {
        Some(full) => full,
        None => {
            let date = parse_day(day).map_err(|_| MeasurementError::MalformedDay(day.to_string()))?;
            let time = TIME_FORMATS
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(ts, format).ok())
                .ok_or_else(|| MeasurementError::MalformedTime(ts.to_string()))?;
            date.and_time(time)
        }
    };

    let wall_clock = wall_clock.with_nanosecond(0).unwrap_or(wall_clock);
    basis
        .to_unix(wall_clock)
        .ok_or(MeasurementError::NonexistentLocalTime(wall_clock))
}
