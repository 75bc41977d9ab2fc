//! Slot arithmetic for per-year bucket files.
//!
//! A year file is a fixed header followed by a dense array of fixed-length
//! slots, one per timeframe interval of that calendar year. These helpers
//! define the stable mapping between epoch seconds, 1-based in-slot indices,
//! and byte offsets:
//!
//! - Slot 1 covers the first interval of the year and begins at
//!   [`HEADER_SIZE`].
//! - `index_to_epoch(k, tf, y) = year_start(y) + (k - 1) * tf.secs()`.
//! - `epoch_to_offset` is the inverse at slot granularity: the offset of the
//!   slot whose interval contains the epoch.
//! - Year boundaries are taken in the configured timezone, not UTC.
//!
//! All arithmetic is 64-bit signed; chrono appears only at calendar edges.

use chrono::{Datelike, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Tz;

use crate::catalog::Timeframe;

/// Size in bytes of the fixed file header written by the catalog layer.
///
/// The header content is opaque to the scan engine; slot 1 begins at this
/// offset.
pub const HEADER_SIZE: i64 = 37_024;

/// Unix seconds of Jan-1 00:00:00 of `year` in `tz`.
pub fn year_start(year: i16, tz: Tz) -> i64 {
    // i16 years are always inside chrono's representable range.
    let midnight = NaiveDate::from_ymd_opt(i32::from(year), 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        // No tzdb zone starts a year inside a DST gap; fall back to the UTC
        // reading of the same wall clock.
        LocalResult::None => midnight.and_utc().timestamp(),
    }
}

/// Number of calendar days in `year` (365 or 366).
pub fn days_in_year(year: i16) -> i64 {
    let y = i32::from(year);
    let jan1 = NaiveDate::from_ymd_opt(y, 1, 1).unwrap_or_default();
    let next = NaiveDate::from_ymd_opt(y + 1, 1, 1).unwrap_or_default();
    (next - jan1).num_days()
}

/// The calendar year containing `epoch`, read in `tz`.
pub fn epoch_year(epoch: i64, tz: Tz) -> i16 {
    match tz.timestamp_opt(epoch, 0) {
        LocalResult::Single(dt) => dt.year() as i16,
        // Out-of-range epochs cannot name a real year file.
        _ => 1970,
    }
}

/// Total size in bytes of the year file for `(tf, year, record_len)`:
/// the header plus one slot per interval of the calendar year.
pub fn file_size(tf: Timeframe, year: i16, record_len: i32) -> i64 {
    HEADER_SIZE + tf.intervals_per_day() * days_in_year(year) * i64::from(record_len)
}

/// 1-based index of the slot whose interval contains `epoch`, within the
/// year file for that epoch's year in `tz`.
pub fn epoch_to_index(epoch: i64, tf: Timeframe, tz: Tz) -> i64 {
    let start = year_start(epoch_year(epoch, tz), tz);
    (epoch - start).div_euclid(tf.secs()) + 1
}

/// Byte offset of the slot containing `epoch` within that epoch's year file.
pub fn epoch_to_offset(epoch: i64, tf: Timeframe, record_len: i32, tz: Tz) -> i64 {
    HEADER_SIZE + (epoch_to_index(epoch, tf, tz) - 1) * i64::from(record_len)
}

/// Epoch seconds at which slot `index` of `year` begins.
pub fn index_to_epoch(index: i64, tf: Timeframe, year: i16, tz: Tz) -> i64 {
    year_start(year, tz) + (index - 1) * tf.secs()
}
