//! Date buckets.
//!
//! A day starts at 05:00 UTC rather than midnight, so an entry written at
//! 1am still lands in the previous day. The offset is fixed: bucket keys are
//! derived from it and must stay identical across runs.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use super::types::{CategoryDescriptor, DateBucket};

/// Hours after midnight UTC at which a bucket day begins.
pub const DAY_BOUNDARY_OFFSET_HOURS: i64 = 5;

fn day_boundary_offset() -> Duration {
    Duration::hours(DAY_BOUNDARY_OFFSET_HOURS)
}

/// Descriptor of the bucket `date` falls into, or `None` when bucketing is
/// off.
///
/// The key is the epoch-millisecond instant the bucket starts (the shifted
/// calendar start plus the day boundary offset).
pub fn bucket_for(date: DateTime<Utc>, mode: DateBucket) -> Option<CategoryDescriptor> {
    let day = (date - day_boundary_offset()).date_naive();

    let (first_day, name) = match mode {
        DateBucket::None => return None,
        DateBucket::Day => (day, day.format("%Y-%m-%d").to_string()),
        DateBucket::Week => {
            let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
            let week = day.iso_week();
            (monday, format!("{}-W{:02}", week.year(), week.week()))
        }
        DateBucket::Month => (day.with_day(1)?, day.format("%Y-%m").to_string()),
    };

    let start = bucket_start(first_day)?;
    Some(CategoryDescriptor::bucket(start.timestamp_millis(), name))
}

fn bucket_start(day: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight) + day_boundary_offset())
}
