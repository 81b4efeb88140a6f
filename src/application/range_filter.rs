// Range normalizer - Fold documents into a filtered, sorted series
use crate::application::measurement_parser::{carry_battery_forward, parse_document};
use crate::domain::date_range::DateRange;
use crate::domain::document::RawDailyDocument;
use crate::domain::reading::{BatteryStatus, NormalizedReading, ReadingSeries, sort_series};
use crate::domain::time_basis::TimeBasis;

/// Output of one normalize pass over a tag's documents.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Sorted ascending by timestamp.
    pub readings: ReadingSeries,
    /// Carry-forward value after the last document.
    pub battery: BatteryStatus,
}

/// Fold `documents` (in the order battery values should carry forward)
/// into one series.
///
/// Every document feeds the battery carry-forward, but only documents whose
/// `day` lies in `range` are parsed, and of those only readings whose own
/// calendar date lies in `range` are kept. `None` keeps everything.
pub fn normalize_documents<'a, I>(
    documents: I,
    range: Option<&DateRange>,
    basis: TimeBasis,
) -> NormalizedBatch
where
    I: IntoIterator<Item = &'a RawDailyDocument>,
{
    let (mut readings, battery) = documents.into_iter().fold(
        (ReadingSeries::new(), BatteryStatus::default()),
        |(mut readings, battery), document| {
            let battery = carry_battery_forward(battery, document);

            if range.is_none_or(|r| r.contains_day(&document.day)) {
                let parsed = parse_document(document, battery, basis);
                tracing::debug!(
                    "Parsed {} of {} measurements for tag {} on {}",
                    parsed.len(),
                    document.measurements.len(),
                    document.tag_id,
                    document.day
                );
                readings.extend(parsed);
            }

            (readings, battery)
        },
    );

    if let Some(range) = range {
        retain_in_range(&mut readings, range, basis);
    }
    sort_series(&mut readings);

    NormalizedBatch { readings, battery }
}

/// Keep readings whose calendar date in `basis` falls inside `range`.
pub fn retain_in_range(series: &mut ReadingSeries, range: &DateRange, basis: TimeBasis) {
    series.retain(|reading| range.contains_instant(reading.timestamp, basis));
}

/// Sorted copy of `series` restricted to `range`.
pub fn filter_series(
    series: &[NormalizedReading],
    range: &DateRange,
    basis: TimeBasis,
) -> ReadingSeries {
    let mut filtered: ReadingSeries = series.to_vec();
    retain_in_range(&mut filtered, range, basis);
    sort_series(&mut filtered);
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::RawMeasurement;
    use chrono::NaiveDate;

    fn utc() -> TimeBasis {
        TimeBasis::utc()
    }

    fn doc(day: &str, times: &[&str]) -> RawDailyDocument {
        RawDailyDocument::new(
            day,
            "A",
            times
                .iter()
                .map(|ts| RawMeasurement::new(ts, "20.0", "40.0"))
                .collect(),
        )
    }

    #[test]
    fn test_output_is_sorted_regardless_of_input_order() {
        let documents = vec![
            doc("2025-01-12", &["10:00:00", "09:00:00"]),
            doc("2025-01-10", &["23:00:00", "01:00:00"]),
            doc("2025-01-11", &["12:00:00"]),
        ];

        let batch = normalize_documents(&documents, None, utc());
        assert_eq!(batch.readings.len(), 5);
        assert!(
            batch
                .readings
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp)
        );
    }

    #[test]
    fn test_single_day_window() {
        let documents = vec![
            doc("2025-01-09", &["12:00:00"]),
            doc("2025-01-10", &["00:00:00", "23:59:59"]),
            doc("2025-01-11", &["00:00:00"]),
        ];
        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let range = DateRange::new(day, day).unwrap();

        let batch = normalize_documents(&documents, Some(&range), utc());
        assert_eq!(batch.readings.len(), 2);
        assert!(
            batch
                .readings
                .iter()
                .all(|r| utc().calendar_date(r.timestamp) == Some(day))
        );
    }

    #[test]
    fn test_measurement_level_filter_inside_boundary_document() {
        // A day document whose entries carry full date-times reaching past the window
        let documents = vec![doc(
            "2025-01-10",
            &["2025-01-10T22:00:00", "2025-01-11T00:30:00"],
        )];
        let range = DateRange::parse("2025-01-10", "2025-01-10").unwrap();

        let batch = normalize_documents(&documents, Some(&range), utc());
        assert_eq!(batch.readings.len(), 1);
    }

    #[test]
    fn test_out_of_range_documents_still_carry_battery() {
        let documents = vec![
            doc("2025-01-01", &["08:00:00"]).with_battery_level("90"),
            doc("2025-01-05", &["08:00:00"]),
        ];
        let range = DateRange::parse("2025-01-05", "2025-01-05").unwrap();

        let batch = normalize_documents(&documents, Some(&range), utc());
        assert_eq!(batch.readings.len(), 1);
        assert_eq!(batch.readings[0].battery_level, Some(90));
        assert_eq!(batch.battery.level, Some(90));
    }

    #[test]
    fn test_readings_before_first_report_have_no_battery() {
        let documents = vec![
            doc("2025-01-01", &["08:00:00"]),
            doc("2025-01-02", &["08:00:00"]).with_battery_voltage("3600"),
        ];

        let batch = normalize_documents(&documents, None, utc());
        assert_eq!(batch.readings[0].battery_voltage, None);
        assert_eq!(batch.readings[1].battery_voltage, Some(3600));
    }

    #[test]
    fn test_filter_series() {
        let documents = vec![doc("2025-01-10", &["08:00:00"]), doc("2025-01-11", &["08:00:00"])];
        let all = normalize_documents(&documents, None, utc()).readings;
        let range = DateRange::parse("2025-01-11", "2025-01-31").unwrap();

        let filtered = filter_series(&all, &range, utc());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].timestamp, all[1].timestamp);
    }
}
