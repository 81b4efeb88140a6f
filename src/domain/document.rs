// Raw daily document model as stored in the document store
use serde::{Deserialize, Deserializer};

/// One sensor tag's readings for one calendar day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDailyDocument {
    #[serde(default, deserialize_with = "lenient_required_string")]
    pub day: String,
    #[serde(default, deserialize_with = "lenient_required_string")]
    pub tag_id: String,
    #[serde(default, deserialize_with = "lenient_measurements")]
    pub measurements: Vec<RawMeasurement>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub battery_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub battery_voltage: Option<String>,
}

/// One sample inside a daily document. Any field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeasurement {
    #[serde(default, deserialize_with = "lenient_string")]
    pub ts: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub t: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub h: Option<String>,
}

impl RawMeasurement {
    pub fn new(ts: &str, t: &str, h: &str) -> Self {
        Self {
            ts: Some(ts.to_string()),
            t: Some(t.to_string()),
            h: Some(h.to_string()),
        }
    }
}

impl RawDailyDocument {
    pub fn new(day: &str, tag_id: &str, measurements: Vec<RawMeasurement>) -> Self {
        Self {
            day: day.to_string(),
            tag_id: tag_id.to_string(),
            measurements,
            battery_level: None,
            battery_voltage: None,
        }
    }

    pub fn with_battery_level(mut self, level: &str) -> Self {
        self.battery_level = Some(level.to_string());
        self
    }

    pub fn with_battery_voltage(mut self, voltage: &str) -> Self {
        self.battery_voltage = Some(voltage.to_string());
        self
    }
}

/// Scalar shapes the store has been seen to use for "string" fields.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Other(serde_json::Value),
}

impl Scalar {
    fn into_string(self) -> Option<String> {
        match self {
            Scalar::Text(s) => Some(s),
            Scalar::Integer(i) => Some(i.to_string()),
            Scalar::Float(f) => Some(f.to_string()),
            Scalar::Other(_) => None,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.and_then(Scalar::into_string))
}

fn lenient_required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_measurements<'de, D>(deserializer: D) -> Result<Vec<RawMeasurement>, D::Error>
where
    D: Deserializer<'de>,
{
    // A non-array `measurements` field is treated as an empty day
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        Some(serde_json::Value::Array(items)) => Ok(items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_plain_document() {
        let json = r#"{
            "day": "2025-01-10",
            "tag_id": "A",
            "measurements": [{"ts": "08:00:00", "t": "21.5", "h": "40.0"}],
            "battery_level": "80"
        }"#;
        let doc: RawDailyDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.day, "2025-01-10");
        assert_eq!(doc.tag_id, "A");
        assert_eq!(doc.measurements.len(), 1);
        assert_eq!(doc.measurements[0].t.as_deref(), Some("21.5"));
        assert_eq!(doc.battery_level.as_deref(), Some("80"));
        assert_eq!(doc.battery_voltage, None);
    }

    #[test]
    fn test_numeric_fields_become_strings() {
        let json = r#"{
            "day": "2025-01-10",
            "tag_id": "A",
            "measurements": [{"ts": "08:00:00", "t": 21.5, "h": 40}],
            "battery_voltage": 3600
        }"#;
        let doc: RawDailyDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.measurements[0].t.as_deref(), Some("21.5"));
        assert_eq!(doc.measurements[0].h.as_deref(), Some("40"));
        assert_eq!(doc.battery_voltage.as_deref(), Some("3600"));
    }

    #[test]
    fn test_missing_and_odd_fields_are_tolerated() {
        let json = r#"{
            "day": "2025-01-10",
            "tag_id": "A",
            "measurements": [{"ts": "08:00:00", "t": true}, "garbage"],
            "battery_level": null
        }"#;
        let doc: RawDailyDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.measurements.len(), 2);
        assert_eq!(doc.measurements[0].t, None);
        assert_eq!(doc.measurements[0].h, None);
        assert!(doc.measurements[1].ts.is_none());
        assert_eq!(doc.battery_level, None);

        let empty: RawDailyDocument = serde_json::from_str(r#"{"tag_id": "B"}"#).unwrap();
        assert!(empty.measurements.is_empty());
        assert_eq!(empty.day, "");
    }
}
