// Summary statistics over a reading series
use super::reading::NormalizedReading;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub latest: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimestampBounds {
    pub first: i64,
    pub last: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub temperature: MetricSummary,
    pub humidity: MetricSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<MetricSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<MetricSummary>,
    pub timestamp: TimestampBounds,
}

impl Statistics {
    /// Value reported for a series with no readings: every field zero.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Summarize a series already sorted ascending by timestamp.
    ///
    /// `latest` is taken from the last reading carrying the metric, so the
    /// input order decides ties between equal timestamps.
    pub fn from_series(series: &[NormalizedReading]) -> Self {
        if series.is_empty() {
            return Self::empty();
        }

        let first = series.iter().map(|r| r.timestamp).min().unwrap_or_default();
        let last = series.iter().map(|r| r.timestamp).max().unwrap_or_default();

        Self {
            temperature: summarize(series.iter().map(|r| r.temperature)).unwrap_or_default(),
            humidity: summarize(series.iter().map(|r| r.humidity)).unwrap_or_default(),
            battery_level: summarize(series.iter().filter_map(|r| r.battery_level.map(|v| v as f64))),
            battery_voltage: summarize(
                series.iter().filter_map(|r| r.battery_voltage.map(|v| v as f64)),
            ),
            timestamp: TimestampBounds { first, last },
        }
    }
}

/// Single pass min/max/mean/last; `None` when the iterator is empty.
fn summarize(values: impl Iterator<Item = f64>) -> Option<MetricSummary> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut summary = MetricSummary {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        avg: 0.0,
        latest: 0.0,
    };

    for value in values {
        count += 1;
        sum += value;
        summary.min = summary.min.min(value);
        summary.max = summary.max.max(value);
        summary.latest = value;
    }

    if count == 0 {
        return None;
    }
    // Clamp so rounding in the sum can never push the mean outside [min, max]
    summary.avg = (sum / count as f64).clamp(summary.min, summary.max);
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(timestamp: i64, temperature: f64, humidity: f64) -> NormalizedReading {
        NormalizedReading {
            tag_id: "A".to_string(),
            timestamp,
            temperature,
            humidity,
            battery_level: None,
            battery_voltage: None,
        }
    }

    #[test]
    fn test_empty_series_yields_zeroed_statistics() {
        let stats = Statistics::from_series(&[]);
        assert_eq!(stats, Statistics::empty());
        assert_eq!(stats.temperature.max, 0.0);
        assert_eq!(stats.timestamp.first, 0);
        assert!(stats.battery_level.is_none());
    }

    #[test]
    fn test_basic_statistics() {
        let series = vec![
            reading(100, 20.0, 40.0),
            reading(200, 24.0, 50.0),
            reading(300, 22.0, 45.0),
        ];
        let stats = Statistics::from_series(&series);

        assert_eq!(stats.temperature.min, 20.0);
        assert_eq!(stats.temperature.max, 24.0);
        assert!((stats.temperature.avg - 22.0).abs() < 1e-9);
        assert_eq!(stats.temperature.latest, 22.0);
        assert_eq!(stats.humidity.latest, 45.0);
        assert_eq!(stats.timestamp, TimestampBounds { first: 100, last: 300 });
        assert!(stats.battery_level.is_none());
        assert!(stats.battery_voltage.is_none());
    }

    #[test]
    fn test_latest_follows_series_order_on_timestamp_ties() {
        let series = vec![reading(100, 20.0, 40.0), reading(100, 18.0, 41.0)];
        let stats = Statistics::from_series(&series);
        assert_eq!(stats.temperature.latest, 18.0);
    }

    #[test]
    fn test_battery_summaries_skip_missing_values() {
        let mut series = vec![
            reading(100, 20.0, 40.0),
            reading(200, 21.0, 40.0),
            reading(300, 22.0, 40.0),
        ];
        series[0].battery_level = Some(90);
        series[1].battery_level = Some(80);

        let stats = Statistics::from_series(&series);
        let level = stats.battery_level.unwrap();
        assert_eq!(level.min, 80.0);
        assert_eq!(level.max, 90.0);
        assert_eq!(level.avg, 85.0);
        assert_eq!(level.latest, 80.0);
        assert!(stats.battery_voltage.is_none());
    }

    #[test]
    fn test_min_avg_max_ordering_holds() {
        let series: Vec<NormalizedReading> = (0..50)
            .map(|i| reading(i, 0.1 * i as f64 - 2.5, 33.3 + (i % 7) as f64))
            .collect();
        let stats = Statistics::from_series(&series);

        for summary in [stats.temperature, stats.humidity] {
            assert!(summary.min <= summary.avg && summary.avg <= summary.max);
        }
        assert_eq!(stats.temperature.latest, series[49].temperature);
        assert!(stats.timestamp.first <= stats.timestamp.last);
    }
}
