//! Error types and SNAFU context selectors for the scan path.
//!
//! This module centralizes the `ScanError` enum used by the planner and the
//! scanner. Selectors are exposed crate-wide (via
//! `#[snafu(visibility(pub(crate)))]`) so sibling modules can attach context
//! without re-exporting internals. Keep new variants here so user-facing
//! messages stay consistent.

use std::io;

use snafu::prelude::*;

/// Errors from planning or executing a range scan.
///
/// No variant is retried inside the engine; transient-I/O retry is a
/// higher-layer concern. On error the partial result is discarded.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ScanError {
    /// Files grouped into one plan disagree on record shape.
    #[snafu(display(
        "Record shape mismatch in {path}: record length {actual}, plan carries {expected}"
    ))]
    RecordLengthInconsistent {
        /// File whose shape disagreed with the plan.
        path: String,
        /// Record length established by the plan's first file.
        expected: i32,
        /// Record length of the offending file.
        actual: i32,
    },

    /// A reverse scan was requested with an unlimited result set.
    #[snafu(display("Reverse scan requires a finite row limit"))]
    ReverseRequiresLimit,

    /// A file ended mid-record; the fixed-stride slot array is corrupt.
    #[snafu(display("Short read of {got} bytes in {path} (record length {record_len})"))]
    ShortRead {
        path: String,
        got: usize,
        record_len: i32,
    },

    /// Opening a data file failed.
    #[snafu(display("Cannot open {path}: {source}"))]
    Open { path: String, source: io::Error },

    /// Repositioning within a data file failed.
    #[snafu(display("Seek failed in {path}: {source}"))]
    Seek { path: String, source: io::Error },

    /// Reading from a data file failed.
    #[snafu(display("Read failed in {path}: {source}"))]
    Read { path: String, source: io::Error },

    /// The caller cancelled the scan; distinct from any I/O failure.
    #[snafu(display("Scan cancelled"))]
    Cancelled,
}
