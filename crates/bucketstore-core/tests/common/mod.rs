//! Shared fixtures for the scan integration tests: on-disk year-file
//! writers built on the crate's own geometry, so written slots round-trip
//! through the scanner.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use chrono_tz::Tz;

use bucketstore_core::catalog::{TimeBucketInfo, TimeBucketKey, Timeframe};
use bucketstore_core::config::EngineConfig;
use bucketstore_core::geometry;
use bucketstore_core::hint::ReadHintCache;
use bucketstore_core::query::{DateRange, ParseResult, QualifiedFile, RowLimit};
use bucketstore_core::{BucketScan, ScanError, Scanner};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const TZ: Tz = chrono_tz::UTC;
pub const KEY: &str = "AAPL/1m/OHLCV";

/// Descriptor for a fixed-record year file under `dir`.
pub fn fixed_info(dir: &Path, year: i16, tf: Timeframe, record_len: i32) -> Arc<TimeBucketInfo> {
    Arc::new(TimeBucketInfo::fixed(
        dir.join(format!("{year}.bin")),
        year,
        tf,
        record_len,
    ))
}

/// Descriptor for a variable-record year file under `dir`.
pub fn variable_info(
    dir: &Path,
    year: i16,
    tf: Timeframe,
    record_len: i32,
    var_rec_len: i32,
) -> Arc<TimeBucketInfo> {
    Arc::new(TimeBucketInfo::variable(
        dir.join(format!("{year}.bin")),
        year,
        tf,
        record_len,
        var_rec_len,
    ))
}

/// Create the (sparse) year file at its full slot-array size.
pub fn create_year_file(info: &TimeBucketInfo) -> TestResult {
    let f = File::create(info.path())?;
    f.set_len(info.file_size() as u64)?;
    Ok(())
}

/// Populate the slot containing `epoch`: in-slot index followed by a
/// payload of `fill` bytes.
pub fn write_slot(info: &TimeBucketInfo, epoch: i64, fill: u8) -> TestResult {
    let index = geometry::epoch_to_index(epoch, info.timeframe(), TZ);
    let offset = geometry::epoch_to_offset(epoch, info.timeframe(), info.record_length(), TZ);
    let mut f = OpenOptions::new().write(true).open(info.path())?;
    f.seek(SeekFrom::Start(offset as u64))?;
    f.write_all(&(index as u64).to_le_bytes())?;
    f.write_all(&vec![fill; info.record_length() as usize - 8])?;
    Ok(())
}

/// Populate a variable-record slot with its `{offset, count}` triplet.
pub fn write_variable_slot(
    info: &TimeBucketInfo,
    epoch: i64,
    data_offset: u64,
    count: u32,
) -> TestResult {
    let index = geometry::epoch_to_index(epoch, info.timeframe(), TZ);
    let offset = geometry::epoch_to_offset(epoch, info.timeframe(), info.record_length(), TZ);
    let mut f = OpenOptions::new().write(true).open(info.path())?;
    f.seek(SeekFrom::Start(offset as u64))?;
    f.write_all(&(index as u64).to_le_bytes())?;
    f.write_all(&data_offset.to_le_bytes())?;
    f.write_all(&count.to_le_bytes())?;
    f.write_all(&vec![0u8; info.record_length() as usize - 20])?;
    Ok(())
}

/// Build a `ParseResult` over `files`, all in the same bucket.
pub fn parse_result(
    files: &[Arc<TimeBucketInfo>],
    range: DateRange,
    limit: RowLimit,
) -> ParseResult {
    let mut pr = ParseResult::new(range, limit);
    for file in files {
        pr.qualified_files.push(QualifiedFile {
            key: TimeBucketKey::from(KEY),
            file: Arc::clone(file),
        });
    }
    pr
}

/// Run one scan with default config and the given hint cache.
pub fn run_scan(
    files: &[Arc<TimeBucketInfo>],
    range: DateRange,
    limit: RowLimit,
    hints: &ReadHintCache,
) -> Result<HashMap<TimeBucketKey, BucketScan>, ScanError> {
    run_parse_result(parse_result(files, range, limit), hints)
}

/// Run a prepared `ParseResult` with default config.
pub fn run_parse_result(
    pr: ParseResult,
    hints: &ReadHintCache,
) -> Result<HashMap<TimeBucketKey, BucketScan>, ScanError> {
    Scanner::new(pr, hints.clone(), &EngineConfig::default())?.read_all()
}

/// Scan result for `key`'s bucket; panics when the bucket is absent.
pub fn bucket<'a>(out: &'a HashMap<TimeBucketKey, BucketScan>, key: &str) -> &'a BucketScan {
    out.get(&TimeBucketKey::from(key)).expect("bucket present")
}

/// Leading epochs of every packed record.
pub fn epochs(data: &[u8], record_len: usize) -> Vec<i64> {
    data.chunks(record_len)
        .map(|rec| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&rec[..8]);
            i64::from_le_bytes(raw)
        })
        .collect()
}
