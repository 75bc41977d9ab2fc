//! Bucket and file descriptors consumed by the planner and scanner.
//!
//! The catalog collaborator owns discovery and layout of the on-disk tree;
//! this module only models what the read path needs: which bucket a file
//! belongs to, its year, its slot width, and its record shape.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::geometry;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * 60;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Extension of the variable-length companion data file.
const VARIABLE_DATA_EXT: &str = "vbin";

/// Opaque identity of one time-series bucket (symbol, timeframe, and
/// attribute group), used as the result-map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucketKey(String);

impl TimeBucketKey {
    pub fn new(key: impl Into<String>) -> Self {
        TimeBucketKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimeBucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimeBucketKey {
    fn from(s: &str) -> Self {
        TimeBucketKey(s.to_string())
    }
}

/// Width of one slot interval.
///
/// Widths must divide a day evenly so that every calendar day contributes the
/// same number of slots to its year file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    Seconds(u32),
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

impl Timeframe {
    /// Interval length in whole seconds.
    pub fn secs(self) -> i64 {
        match self {
            Timeframe::Seconds(n) => i64::from(n),
            Timeframe::Minutes(n) => i64::from(n) * SECONDS_PER_MINUTE,
            Timeframe::Hours(n) => i64::from(n) * SECONDS_PER_HOUR,
            Timeframe::Days(n) => i64::from(n) * SECONDS_PER_DAY,
        }
    }

    /// Number of slots each calendar day contributes to a year file.
    pub fn intervals_per_day(self) -> i64 {
        SECONDS_PER_DAY / self.secs()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Timeframe::Seconds(n) => write!(f, "{n}s"),
            Timeframe::Minutes(n) => write!(f, "{n}m"),
            Timeframe::Hours(n) => write!(f, "{n}h"),
            Timeframe::Days(n) => write!(f, "{n}d"),
        }
    }
}

/// Errors from parsing a [`Timeframe`] out of its string form.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseTimeframeError {
    /// The input was empty or had no leading digits.
    #[snafu(display("Invalid timeframe {input:?}: expected forms like \"30s\", \"1m\", \"4h\", \"1d\""))]
    Malformed { input: String },

    /// The count was zero.
    #[snafu(display("Timeframe {input:?} must be positive"))]
    Zero { input: String },

    /// The width does not divide 24 hours evenly.
    #[snafu(display("Timeframe {input:?} does not divide a day evenly"))]
    UnevenDay { input: String },
}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        let unit = &s[digits.len()..];
        let n: u32 = digits
            .parse()
            .ok()
            .context(MalformedSnafu { input: s })?;
        ensure!(n > 0, ZeroSnafu { input: s });
        let tf = match unit {
            "s" | "S" | "Sec" => Timeframe::Seconds(n),
            "m" | "Min" => Timeframe::Minutes(n),
            "h" | "H" | "Hour" => Timeframe::Hours(n),
            "d" | "D" | "Day" => Timeframe::Days(n),
            _ => return MalformedSnafu { input: s }.fail(),
        };
        ensure!(
            SECONDS_PER_DAY % tf.secs() == 0,
            UnevenDaySnafu { input: s }
        );
        Ok(tf)
    }
}

/// Shape of records in a year file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    /// Each slot holds the full payload.
    Fixed,
    /// Each slot holds an `{offset, length}` reference into the companion
    /// data file; the payload is resolved in a second read stage.
    Variable,
}

/// Immutable descriptor of one on-disk year file.
#[derive(Debug, Clone)]
pub struct TimeBucketInfo {
    path: PathBuf,
    year: i16,
    timeframe: Timeframe,
    record_length: i32,
    record_type: RecordType,
    variable_record_length: i32,
    intervals_per_day: i64,
}

impl TimeBucketInfo {
    /// Descriptor for a fixed-length record file.
    pub fn fixed(path: impl Into<PathBuf>, year: i16, timeframe: Timeframe, record_length: i32) -> Self {
        TimeBucketInfo {
            path: path.into(),
            year,
            timeframe,
            record_length,
            record_type: RecordType::Fixed,
            variable_record_length: 0,
            intervals_per_day: timeframe.intervals_per_day(),
        }
    }

    /// Descriptor for a variable-length record file whose companion stores
    /// elements of `variable_record_length` bytes.
    pub fn variable(
        path: impl Into<PathBuf>,
        year: i16,
        timeframe: Timeframe,
        record_length: i32,
        variable_record_length: i32,
    ) -> Self {
        // Primary slots must at least hold {index/epoch, offset, length}.
        debug_assert!(record_length >= 20, "variable record length {record_length} too small");
        TimeBucketInfo {
            path: path.into(),
            year,
            timeframe,
            record_length,
            record_type: RecordType::Variable,
            variable_record_length,
            intervals_per_day: timeframe.intervals_per_day(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn year(&self) -> i16 {
        self.year
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn record_length(&self) -> i32 {
        self.record_length
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn variable_record_length(&self) -> i32 {
        self.variable_record_length
    }

    /// Slots per calendar day, precomputed from the timeframe.
    pub fn intervals(&self) -> i64 {
        self.intervals_per_day
    }

    /// Total on-disk size of this year file.
    pub fn file_size(&self) -> i64 {
        geometry::file_size(self.timeframe, self.year, self.record_length)
    }

    /// Path of the companion file holding this file's variable-length data.
    pub fn variable_data_path(&self) -> PathBuf {
        variable_data_path(&self.path)
    }
}

/// Derive the variable-length companion path from a year-file path by
/// swapping the extension.
pub fn variable_data_path(path: &Path) -> PathBuf {
    path.with_extension(VARIABLE_DATA_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeframe_parses_common_forms() {
        assert_eq!("30s".parse::<Timeframe>().unwrap(), Timeframe::Seconds(30));
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::Minutes(1));
        assert_eq!("5Min".parse::<Timeframe>().unwrap(), Timeframe::Minutes(5));
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::Hours(4));
        assert_eq!("1D".parse::<Timeframe>().unwrap(), Timeframe::Days(1));
    }

    #[test]
    fn timeframe_rejects_bad_input() {
        assert!(matches!(
            "".parse::<Timeframe>(),
            Err(ParseTimeframeError::Malformed { .. })
        ));
        assert!(matches!(
            "m".parse::<Timeframe>(),
            Err(ParseTimeframeError::Malformed { .. })
        ));
        assert!(matches!(
            "5x".parse::<Timeframe>(),
            Err(ParseTimeframeError::Malformed { .. })
        ));
        assert!(matches!(
            "0m".parse::<Timeframe>(),
            Err(ParseTimeframeError::Zero { .. })
        ));
        assert!(matches!(
            "7h".parse::<Timeframe>(),
            Err(ParseTimeframeError::UnevenDay { .. })
        ));
    }

    #[test]
    fn timeframe_display_round_trips() {
        for s in ["30s", "1m", "4h", "1d"] {
            let tf: Timeframe = s.parse().unwrap();
            assert_eq!(tf.to_string(), s);
        }
    }

    #[test]
    fn intervals_per_day_matches_width() {
        assert_eq!(Timeframe::Minutes(1).intervals_per_day(), 1440);
        assert_eq!(Timeframe::Seconds(30).intervals_per_day(), 2880);
        assert_eq!(Timeframe::Days(1).intervals_per_day(), 1);
    }

    #[test]
    fn companion_path_swaps_extension() {
        let info = TimeBucketInfo::variable("/data/AAPL/1m/2020.bin", 2020, Timeframe::Minutes(1), 24, 1);
        assert_eq!(
            info.variable_data_path(),
            PathBuf::from("/data/AAPL/1m/2020.vbin")
        );
    }

    #[test]
    fn fixed_descriptor_precomputes_intervals() {
        let info = TimeBucketInfo::fixed("/data/x/2020.bin", 2020, Timeframe::Minutes(1), 48);
        assert_eq!(info.intervals(), 1440);
        assert_eq!(info.record_type(), RecordType::Fixed);
        assert_eq!(info.variable_record_length(), 0);
    }
}
