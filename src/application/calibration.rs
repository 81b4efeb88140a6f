// Date-range auto-calibration on first load
use crate::domain::reading::NormalizedReading;
use serde::Serialize;

/// Inclusive span of instants, unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    pub start: i64,
    pub end: i64,
}

/// Narrows the display window to the loaded data exactly once.
///
/// Once calibrated (automatically, or because the user set a range), later
/// loads never move the window again until `reset` is called.
#[derive(Debug, Clone, Default)]
pub struct RangeCalibrator {
    calibrated: bool,
}

impl RangeCalibrator {
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Span of `series`, if this is the first calibration and there is data.
    pub fn calibrate(&mut self, series: &[NormalizedReading]) -> Option<TimeSpan> {
        if self.calibrated {
            return None;
        }
        let start = series.iter().map(|r| r.timestamp).min()?;
        let end = series.iter().map(|r| r.timestamp).max()?;

        self.calibrated = true;
        Some(TimeSpan { start, end })
    }

    /// The user chose a range; automatic calibration must not override it.
    pub fn lock(&mut self) {
        self.calibrated = true;
    }

    pub fn reset(&mut self) {
        self.calibrated = false;
    }
}
