//! I/O planning: turning a year-sorted file list and a parsed query into
//! the byte regions a scan will touch.
//!
//! For each bucket the planner emits two ordered segment lists:
//!
//! - `file_segments`: regions inside the query range, ascending by year,
//!   clipped to the range boundaries at the edge years and truncated by the
//!   read-hint cache where a populated tail offset is known.
//! - `prior_segments`: regions strictly before the range, ordered
//!   newest-first, scanned only to recover the previous timestamp.
//!
//! All files of one plan must agree on record shape; the plan is immutable
//! during scanning except for each segment's one-shot `seeking_last` flag.

use std::sync::Arc;

use chrono_tz::Tz;
use log::debug;

use crate::catalog::{RecordType, TimeBucketInfo};
use crate::geometry;
use crate::hint::ReadHintCache;
use crate::query::{DateRange, QualifiedFile, RowLimit, ScanDirection, TimeQual};
use crate::scan::error::{RecordLengthInconsistentSnafu, ScanError};

/// One contiguous byte region of a year file.
#[derive(Debug, Clone)]
pub(crate) struct FileSegment {
    pub(crate) tbi: Arc<TimeBucketInfo>,
    /// First byte to read; slot-aligned, never before the header.
    pub(crate) offset: i64,
    /// Bytes to scan from `offset`.
    pub(crate) length: i64,
    /// Unix seconds of the file's year start in the configured timezone.
    pub(crate) base_time: i64,
    /// One-shot: the first packing pass over this segment that observes
    /// populated slots publishes the newest one's absolute offset to the
    /// hint cache, then the flag clears.
    pub(crate) seeking_last: bool,
}

impl FileSegment {
    fn new(tbi: &Arc<TimeBucketInfo>, offset: i64, length: i64, base_time: i64) -> Self {
        FileSegment {
            tbi: Arc::clone(tbi),
            offset,
            length,
            base_time,
            seeking_last: false,
        }
    }
}

/// Scan plan for one bucket.
pub(crate) struct IoPlan {
    pub(crate) file_segments: Vec<FileSegment>,
    pub(crate) prior_segments: Vec<FileSegment>,
    pub(crate) record_len: i32,
    pub(crate) record_type: RecordType,
    pub(crate) variable_record_len: i32,
    pub(crate) limit: RowLimit,
    pub(crate) time_quals: Vec<TimeQual>,
}

impl std::fmt::Debug for IoPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoPlan")
            .field("file_segments", &self.file_segments)
            .field("prior_segments", &self.prior_segments)
            .field("record_len", &self.record_len)
            .field("record_type", &self.record_type)
            .field("variable_record_len", &self.variable_record_len)
            .field("limit", &self.limit)
            .field("time_quals", &self.time_quals.len())
            .finish()
    }
}

impl IoPlan {
    /// Build the plan for one bucket from its year-ascending file list.
    pub(crate) fn build(
        files: &[QualifiedFile],
        range: &DateRange,
        limit: RowLimit,
        time_quals: &[TimeQual],
        hints: &ReadHintCache,
        tz: Tz,
    ) -> Result<IoPlan, ScanError> {
        let mut plan = IoPlan {
            file_segments: Vec::new(),
            prior_segments: Vec::new(),
            record_len: 0,
            record_type: RecordType::Fixed,
            variable_record_len: 0,
            limit,
            time_quals: time_quals.to_vec(),
        };
        let mut prior: Vec<FileSegment> = Vec::new();

        for qf in files {
            let tbi = &qf.file;
            let record_len = i64::from(tbi.record_length());
            let base_time = geometry::year_start(tbi.year(), tz);
            let mut start_offset = geometry::HEADER_SIZE;
            let mut end_offset = tbi.file_size();
            let mut length = end_offset - start_offset;
            // One extra record admits the slot whose start boundary equals
            // the range end.
            let max_length = length + record_len;

            if plan.record_len == 0 {
                plan.record_len = tbi.record_length();
                plan.record_type = tbi.record_type();
                plan.variable_record_len = tbi.variable_record_length();
            } else if tbi.record_length() != plan.record_len
                || tbi.record_type() != plan.record_type
                || tbi.variable_record_length() != plan.variable_record_len
            {
                return RecordLengthInconsistentSnafu {
                    path: tbi.path().display().to_string(),
                    expected: plan.record_len,
                    actual: tbi.record_length(),
                }
                .fail();
            }

            if tbi.year() < range.start_year {
                // Entirely before the range: only useful for recovering the
                // previous timestamp.
                prior.push(FileSegment::new(tbi, start_offset, length, base_time));
            } else if tbi.year() <= range.end_year {
                if tbi.year() == range.start_year {
                    start_offset = geometry::epoch_to_offset(
                        range.start,
                        tbi.timeframe(),
                        tbi.record_length(),
                        tz,
                    );
                }
                if tbi.year() == range.end_year {
                    end_offset = geometry::epoch_to_offset(
                        range.end,
                        tbi.timeframe(),
                        tbi.record_length(),
                        tz,
                    ) + record_len;
                }
                if let Some(last_known) = hints.last_known(tbi.path()) {
                    // Everything past the last known populated slot is a
                    // hole; stop the scan there.
                    let hinted = last_known + record_len;
                    if hinted < end_offset {
                        end_offset = hinted;
                    }
                }
                length = (end_offset - start_offset).min(max_length);

                let mut seg = FileSegment::new(tbi, start_offset, length, base_time);
                seg.seeking_last = limit.direction == ScanDirection::Last;
                plan.file_segments.push(seg);

                // The in-range head of the start year walks left from the
                // range boundary when recovering the previous timestamp.
                if tbi.year() == range.start_year && start_offset > geometry::HEADER_SIZE {
                    prior.push(FileSegment::new(
                        tbi,
                        geometry::HEADER_SIZE,
                        start_offset - geometry::HEADER_SIZE,
                        base_time,
                    ));
                }
            }
        }

        prior.reverse();
        plan.prior_segments = prior;
        debug!(
            "io plan: {} segments, {} prior, record_len={}",
            plan.file_segments.len(),
            plan.prior_segments.len(),
            plan.record_len
        );
        Ok(plan)
    }
}
