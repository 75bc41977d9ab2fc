//! Parsed-query inputs handed to the scanner by the query parser.
//!
//! The parser itself lives upstream; this module only models its output:
//! the date range, the row limit, the per-row time predicates, and the
//! catalog files that qualified for the query.

use std::fmt;
use std::sync::Arc;

use chrono_tz::Tz;

use crate::catalog::{TimeBucketInfo, TimeBucketKey};
use crate::geometry;

/// Last representable second of year 9999 UTC, the catalog horizon.
const MAX_EPOCH: i64 = 253_402_300_799;

/// Which end of the range a limited scan anchors to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    /// No direction given by the parser; scans forward.
    #[default]
    Unset,
    /// Keep the earliest rows.
    First,
    /// Keep the latest rows; requires a finite row count.
    Last,
}

/// Row cap for one query. `rows: None` means unlimited, which is only valid
/// for forward scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowLimit {
    pub direction: ScanDirection,
    pub rows: Option<u32>,
}

impl RowLimit {
    /// The earliest `rows` records of the range.
    pub fn first(rows: u32) -> Self {
        RowLimit {
            direction: ScanDirection::First,
            rows: Some(rows),
        }
    }

    /// The latest `rows` records of the range.
    pub fn last(rows: u32) -> Self {
        RowLimit {
            direction: ScanDirection::Last,
            rows: Some(rows),
        }
    }

    /// Every record of the range, forward.
    pub fn unlimited() -> Self {
        RowLimit::default()
    }
}

/// Closed query interval in epoch seconds, with its boundary years resolved
/// in the configured timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
    pub start_year: i16,
    pub end_year: i16,
}

impl DateRange {
    pub fn new(start: i64, end: i64, tz: Tz) -> Self {
        DateRange {
            start,
            end,
            start_year: geometry::epoch_year(start, tz),
            end_year: geometry::epoch_year(end, tz),
        }
    }

    /// The unconstrained range, spanning the whole catalog horizon. Used
    /// when the parser supplies no range.
    pub fn all(tz: Tz) -> Self {
        DateRange::new(0, MAX_EPOCH, tz)
    }
}

/// Per-row time predicate; a row is kept only if every predicate of the
/// query accepts its epoch.
pub type TimeQual = Arc<dyn Fn(i64) -> bool + Send + Sync>;

/// One catalog file that qualified for the query, tagged with its bucket.
#[derive(Debug, Clone)]
pub struct QualifiedFile {
    pub key: TimeBucketKey,
    pub file: Arc<TimeBucketInfo>,
}

/// Everything the scanner needs from the query parser.
pub struct ParseResult {
    /// Query interval; `None` scans the whole catalog horizon.
    pub range: Option<DateRange>,
    pub limit: RowLimit,
    pub qualified_files: Vec<QualifiedFile>,
    pub time_quals: Vec<TimeQual>,
}

impl ParseResult {
    pub fn new(range: DateRange, limit: RowLimit) -> Self {
        ParseResult {
            range: Some(range),
            limit,
            qualified_files: Vec::new(),
            time_quals: Vec::new(),
        }
    }
}

impl fmt::Debug for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseResult")
            .field("range", &self.range)
            .field("limit", &self.limit)
            .field("qualified_files", &self.qualified_files)
            .field("time_quals", &self.time_quals.len())
            .finish()
    }
}
