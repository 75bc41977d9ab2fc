//! Wrapper prelude.
//!
//! The `bucketstore` crate is the supported public entry point. Downstream
//! code should prefer importing from this prelude instead of depending on
//! internal core module paths.

pub use crate::{
    BucketScan, CancelToken, DateRange, EngineConfig, ParseResult, PrevAnchor, QualifiedFile,
    ReadHintCache, RecordType, RowLimit, ScanDirection, ScanError, Scanner, TimeBucketInfo,
    TimeBucketKey, Timeframe,
};
