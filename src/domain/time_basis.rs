// Wall-clock zone used to turn calendar dates and times into instants
use chrono::{DateTime, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use std::str::FromStr;
use thiserror::Error;

/// Zone in which a document's `day` and a measurement's `ts` are interpreted.
///
/// Readings are recorded as local wall-clock values, so the default is the
/// host's local zone. A fixed offset can be configured for deployments whose
/// host zone differs from the sensors'.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeBasis {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl TimeBasis {
    pub fn utc() -> Self {
        TimeBasis::Fixed(Utc.fix())
    }

    /// Resolve a wall-clock value to unix seconds.
    ///
    /// Returns `None` for a local time skipped by a DST transition. A repeated
    /// local time resolves to the earlier instant.
    pub fn to_unix(&self, wall_clock: NaiveDateTime) -> Option<i64> {
        match self {
            TimeBasis::Local => earliest(Local.from_local_datetime(&wall_clock)),
            TimeBasis::Fixed(offset) => earliest(offset.from_local_datetime(&wall_clock)),
        }
    }

    /// Wall-clock value of an instant in this zone.
    pub fn to_wall_clock(&self, unix_seconds: i64) -> Option<NaiveDateTime> {
        let utc = DateTime::from_timestamp(unix_seconds, 0)?;
        Some(match self {
            TimeBasis::Local => utc.with_timezone(&Local).naive_local(),
            TimeBasis::Fixed(offset) => utc.with_timezone(offset).naive_local(),
        })
    }

    /// Calendar date of an instant in this zone.
    pub fn calendar_date(&self, unix_seconds: i64) -> Option<NaiveDate> {
        self.to_wall_clock(unix_seconds).map(|dt| dt.date())
    }
}

fn earliest<Tz: TimeZone>(result: LocalResult<DateTime<Tz>>) -> Option<i64> {
    result.earliest().map(|dt| dt.timestamp())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timezone '{0}': expected 'local', 'utc' or an offset like '+02:00'")]
pub struct InvalidTimeBasis(pub String);

impl FromStr for TimeBasis {
    type Err = InvalidTimeBasis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(TimeBasis::Local),
            "utc" | "z" => Ok(TimeBasis::utc()),
            other => other
                .parse::<FixedOffset>()
                .map(TimeBasis::Fixed)
                .map_err(|_| InvalidTimeBasis(s.to_string())),
        }
    }
}
