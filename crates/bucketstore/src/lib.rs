//! # bucketstore
//!
//! Range-scan read engine over per-year, slot-indexed time-series bucket
//! files.
//!
//! This crate is the supported public entry point and provides a small,
//! stable surface over `bucketstore-core`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bucketstore::prelude::*;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

pub use bucketstore_core::catalog::{
    ParseTimeframeError, RecordType, TimeBucketInfo, TimeBucketKey, Timeframe,
};
pub use bucketstore_core::config::{ConfigError, EngineConfig, PrevAnchor};
pub use bucketstore_core::hint::ReadHintCache;
pub use bucketstore_core::query::{
    DateRange, ParseResult, QualifiedFile, RowLimit, ScanDirection, TimeQual,
};
pub use bucketstore_core::{BucketScan, CancelToken, ScanError, Scanner};
