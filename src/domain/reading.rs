// Normalized reading and battery domain models
use serde::Serialize;

/// One point of a tag's reading series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedReading {
    pub tag_id: String,
    /// Unix seconds, always whole.
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<i64>,
}

/// Time-ordered readings of one tag.
pub type ReadingSeries = Vec<NormalizedReading>;

/// Stable ascending sort by timestamp. Equal timestamps keep their order.
pub fn sort_series(series: &mut ReadingSeries) {
    series.sort_by_key(|reading| reading.timestamp);
}

/// Last known battery level (percent) and voltage (millivolts) of a tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatteryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<i64>,
}

impl BatteryStatus {
    pub fn level_health(&self) -> Option<BatteryHealth> {
        self.level.map(BatteryHealth::from_level)
    }

    pub fn voltage_health(&self) -> Option<BatteryHealth> {
        self.voltage.map(BatteryHealth::from_voltage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatteryHealth {
    Low,
    Medium,
    Good,
}

const LEVEL_LOW_PERCENT: i64 = 30;
const LEVEL_MEDIUM_PERCENT: i64 = 50;
// Li-ion / LiPo cell thresholds
const VOLTAGE_LOW_MV: i64 = 3300;
const VOLTAGE_MEDIUM_MV: i64 = 3700;

impl BatteryHealth {
    pub fn from_level(percent: i64) -> Self {
        if percent < LEVEL_LOW_PERCENT {
            BatteryHealth::Low
        } else if percent < LEVEL_MEDIUM_PERCENT {
            BatteryHealth::Medium
        } else {
            BatteryHealth::Good
        }
    }

    pub fn from_voltage(millivolts: i64) -> Self {
        if millivolts < VOLTAGE_LOW_MV {
            BatteryHealth::Low
        } else if millivolts < VOLTAGE_MEDIUM_MV {
            BatteryHealth::Medium
        } else {
            BatteryHealth::Good
        }
    }
}

/// Battery status as handed to API clients, with health bands attached.
#[derive(Debug, Clone, Serialize)]
pub struct BatteryReport {
    #[serde(flatten)]
    pub status: BatteryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_health: Option<BatteryHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_health: Option<BatteryHealth>,
}

impl From<BatteryStatus> for BatteryReport {
    fn from(status: BatteryStatus) -> Self {
        Self {
            level_health: status.level_health(),
            voltage_health: status.voltage_health(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(timestamp: i64, temperature: f64) -> NormalizedReading {
        NormalizedReading {
            tag_id: "A".to_string(),
            timestamp,
            temperature,
            humidity: 50.0,
            battery_level: None,
            battery_voltage: None,
        }
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let mut series = vec![reading(300, 1.0), reading(100, 2.0), reading(300, 3.0)];
        sort_series(&mut series);

        let order: Vec<f64> = series.iter().map(|r| r.temperature).collect();
        assert_eq!(order, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_battery_health_bands() {
        assert_eq!(BatteryHealth::from_level(29), BatteryHealth::Low);
        assert_eq!(BatteryHealth::from_level(30), BatteryHealth::Medium);
        assert_eq!(BatteryHealth::from_level(50), BatteryHealth::Good);

        assert_eq!(BatteryHealth::from_voltage(3299), BatteryHealth::Low);
        assert_eq!(BatteryHealth::from_voltage(3600), BatteryHealth::Medium);
        assert_eq!(BatteryHealth::from_voltage(3700), BatteryHealth::Good);
    }

    #[test]
    fn test_battery_report_serialization_skips_missing_fields() {
        let report = BatteryReport::from(BatteryStatus {
            level: None,
            voltage: Some(3600),
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"voltage": 3600, "voltage_health": "medium"}));
    }
}
