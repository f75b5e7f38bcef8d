//! Calendar buckets used to group readings.
//!
//! All bucketing happens in a fixed local offset; bounds are returned in UTC
//! and are inclusive on both ends (`end` is the last millisecond of the bucket).

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 3] = [PeriodType::Daily, PeriodType::Weekly, PeriodType::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    /// Bucket containing `at`.
    ///
    /// Weeks run Sunday through Saturday.
    pub fn bounds(self, at: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        let day = local_date(at, offset);
        let (first, next) = match self {
            PeriodType::Daily => (day, day + Duration::days(1)),
            PeriodType::Weekly => {
                let back = i64::from(day.weekday().num_days_from_sunday());
                let start = day - Duration::days(back);
                (start, start + Duration::days(7))
            }
            PeriodType::Monthly => {
                let start = first_of_month(day);
                (start, first_of_month(start + Duration::days(31)))
            }
        };

        (
            local_midnight(first, offset),
            local_midnight(next, offset) - Duration::milliseconds(1),
        )
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(PeriodType::Daily),
            "weekly" => Ok(PeriodType::Weekly),
            "monthly" => Ok(PeriodType::Monthly),
            other => Err(ParseEnumError::new("period type", other)),
        }
    }
}

/// Last millisecond of the local month containing `at`.
pub fn end_of_month(at: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    PeriodType::Monthly.bounds(at, offset).1
}

/// True when the next local calendar day belongs to another month.
pub fn is_last_day_of_month(at: DateTime<Utc>, offset: FixedOffset) -> bool {
    let day = local_date(at, offset);
    (day + Duration::days(1)).month() != day.month()
}

/// "March 2025" style label of the local month containing `at`.
pub fn month_label(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%B %Y").to_string()
}

fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.day0()))
}

fn local_midnight(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let naive_utc =
        day.and_time(NaiveTime::MIN) - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&naive_utc)
}
