// Row-oriented projection of readings for export
use super::reading::NormalizedReading;
use super::time_basis::TimeBasis;
use serde::Serialize;

pub const EXPORT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub const MISSING_VALUE: &str = "N/A";

/// Flat export record. Field order is column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub tag_id: String,
    pub battery_level: String,
    pub battery_voltage: String,
}

impl ExportRow {
    pub const COLUMNS: [&'static str; 6] = [
        "timestamp",
        "temperature",
        "humidity",
        "tag_id",
        "battery_level",
        "battery_voltage",
    ];

    pub fn from_reading(reading: &NormalizedReading, basis: TimeBasis) -> Self {
        let timestamp = basis
            .to_wall_clock(reading.timestamp)
            .map(|dt| dt.format(EXPORT_TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| reading.timestamp.to_string());

        Self {
            timestamp,
            temperature: reading.temperature,
            humidity: reading.humidity,
            tag_id: reading.tag_id.clone(),
            battery_level: optional_value(reading.battery_level),
            battery_voltage: optional_value(reading.battery_voltage),
        }
    }
}

fn optional_value(value: Option<i64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| MISSING_VALUE.to_string())
}
