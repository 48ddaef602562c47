use crate::infrastructure::error::AppError;
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// Parse a zero-padded `HH:MM` wall-clock time into minutes since midnight.
///
/// Hours run 0..=24; `24:00` is accepted as the end-of-day sentinel, but any
/// other minute past hour 24 is rejected.
pub fn parse_time(value: &str) -> Result<u32, AppError> {
    let mut split = value.split(':');
    let (Some(hour_str), Some(minute_str), None) = (split.next(), split.next(), split.next())
    else {
        return Err(invalid_time(value));
    };

    let hours: u32 = hour_str.parse().map_err(|_| invalid_time(value))?;
    let minutes: u32 = minute_str.parse().map_err(|_| invalid_time(value))?;
    if hours > 24 || minutes > 59 || (hours == 24 && minutes != 0) {
        return Err(invalid_time(value));
    }
    Ok(hours * 60 + minutes)
}

fn invalid_time(value: &str) -> AppError {
    AppError::Validation(format!("time must be HH:MM between 00:00 and 24:00, got '{value}'"))
}

/// Format minutes since midnight as zero-padded `HH:MM`. Hour values of 24
/// and above are kept as-is rather than wrapped (1440 -> "24:00").
pub fn format_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Snap a minute offset to the nearest 5-minute boundary, halves rounding up.
pub fn snap_to_five(minutes: u32) -> u32 {
    (minutes + 2) / 5 * 5
}

/// Half-open interval intersection: `[a_start, a_end)` overlaps
/// `[b_start, b_end)` iff each starts before the other ends. Intervals that
/// merely touch do not overlap.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("date must be YYYY-MM-DD, got '{value}'")))
}

/// The current calendar date in the given timezone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Deterministic rotation slot for a calendar date: the 1-based ordinal day of
/// the year modulo the rotation length. Stable across repeated calls on the
/// same date and cycles through every slot over `len` consecutive days.
pub fn rotation_index(date: NaiveDate, len: usize) -> usize {
    debug_assert!(len > 0);
    date.ordinal() as usize % len
}
