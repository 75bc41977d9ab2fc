//! Range-scan read engine for per-year, slot-indexed time-series files.
//!
//! A bucket (symbol + timeframe + attribute group) persists fixed-interval
//! records into one append-structured file per calendar year: a fixed
//! header followed by a dense slot array, one fixed-length slot per
//! timeframe interval, where a zero leading index marks a hole. This crate
//! turns a parsed query over such files into densely packed result buffers,
//! one per bucket, plus the "previous timestamp" marker callers use to
//! stitch adjacent intervals.
//!
//! Layers, leaves first:
//!
//! - [`geometry`]: pure arithmetic between epoch seconds, in-slot indices,
//!   and byte offsets, anchored to the configured timezone's year starts.
//! - [`hint`]: the advisory [`hint::ReadHintCache`] of last-known-populated
//!   offsets, used to stop scans before a file's empty tail.
//! - [`catalog`]: descriptors of buckets and year files as the catalog
//!   collaborator hands them over.
//! - [`query`]: the parsed-query surface (range, row limit, time
//!   predicates, qualified files).
//! - `plan` (internal): per-bucket I/O plans of range-clipped file
//!   segments plus the prior segments used for previous-timestamp
//!   recovery.
//! - [`scan`]: the [`Scanner`] executing plans forward or in reverse, with
//!   the two-stage read for variable-length records.
//! - [`config`]: process-level engine configuration.
//!
//! The write path, catalog discovery, query parsing, and the row-to-column
//! transposition of result buffers are upstream/downstream collaborators,
//! not part of this crate.

pub mod catalog;
pub mod config;
pub mod geometry;
pub mod hint;
pub mod query;
pub mod scan;

mod plan;

pub use scan::error::ScanError;
pub use scan::{BucketScan, CancelToken, Scanner};
