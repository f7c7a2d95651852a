//! Locale-aware date parsing into day, month or year buckets.

use chrono::{Datelike, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::types::TimestampMs;

/// Date patterns and UTC offset used to interpret filter values.
///
/// Patterns use `chrono` strftime syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateLocale {
    /// Short date pattern, e.g. `%m/%d/%Y`.
    pub short_date: String,
    /// Month and year pattern, e.g. `%B %Y`.
    pub month_year: String,
    /// Offset from UTC of local midnight, in minutes.
    pub utc_offset_minutes: i32,
}

impl Default for DateLocale {
    fn default() -> Self {
        Self::en_us()
    }
}

impl DateLocale {
    /// US conventions at UTC.
    pub fn en_us() -> Self {
        Self {
            short_date: "%m/%d/%Y".to_string(),
            month_year: "%B %Y".to_string(),
            utc_offset_minutes: 0,
        }
    }

    /// ISO-8601 dates at UTC.
    pub fn iso() -> Self {
        Self {
            short_date: "%Y-%m-%d".to_string(),
            month_year: "%Y-%m".to_string(),
            utc_offset_minutes: 0,
        }
    }

    /// Returns a copy using `minutes` east of UTC for local midnight.
    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// Parses `raw` into the bucket it denotes.
    ///
    /// Tries the short date, then month and year, then a bare year. The first
    /// pattern consuming all of `raw` wins.
    pub fn parse_bucket(&self, raw: &str) -> Option<DateBucket> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(day) = NaiveDate::parse_from_str(raw, &self.short_date) {
            let next = day.succ_opt()?;
            return self.bucket(day, next, Granularity::Day);
        }

        let with_day = format!("1 {raw}");
        let pattern = format!("%d {}", self.month_year);
        if let Ok(first) = NaiveDate::parse_from_str(&with_day, &pattern) {
            let next = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
            };
            return self.bucket(first, next, Granularity::Month);
        }

        if raw.chars().all(|c| c.is_ascii_digit()) {
            let year: i32 = raw.parse().ok()?;
            let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
            let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
            return self.bucket(first, next, Granularity::Year);
        }

        None
    }

    /// Milliseconds of local midnight starting `date`.
    pub fn midnight_ms(&self, date: NaiveDate) -> Option<TimestampMs> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)?;
        let local = date.and_hms_opt(0, 0, 0)?;
        let at = offset.from_local_datetime(&local).single()?;
        Some(at.timestamp_millis())
    }

    fn bucket(
        &self,
        first: NaiveDate,
        next: NaiveDate,
        granularity: Granularity,
    ) -> Option<DateBucket> {
        Some(DateBucket {
            start: self.midnight_ms(first)?,
            end: self.midnight_ms(next)?,
            granularity,
        })
    }
}

/// Calendar field a date string was parsed down to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
    Year,
}

/// Half-open time range `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBucket {
    pub start: TimestampMs,
    pub end: TimestampMs,
    pub granularity: Granularity,
}

impl DateBucket {
    /// Last millisecond inside the bucket.
    pub fn last(&self) -> TimestampMs {
        self.end - 1
    }

    pub fn len_ms(&self) -> i64 {
        self.end - self.start
    }
}
