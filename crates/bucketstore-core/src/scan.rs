//! Scan execution: drives per-bucket I/O plans to packed result buffers.
//!
//! One [`Scanner`] serves one query. It groups the qualified files by bucket,
//! builds an I/O plan per bucket, and executes each plan with the strategy
//! its row limit selects:
//!
//! - forward (`First` / `Unset`): stream segments in plan order, truncate at
//!   the row cap, then walk the prior segments newest-first to recover the
//!   previous timestamp;
//! - reverse (`Last`): visit segments newest-first, filling a fixed buffer
//!   tail-first window by window; the extra oldest record carries the
//!   previous timestamp and is trimmed from the result.
//!
//! The scanner owns its two scratch buffers, so buckets of one query are
//! scanned sequentially; concurrent queries use independent scanners and
//! share only the advisory [`ReadHintCache`]. Cancellation is honored
//! between segments and between read windows.

pub mod error;
pub(crate) mod pack;
mod variable;

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono_tz::Tz;
use snafu::prelude::*;

use crate::catalog::{RecordType, TimeBucketKey};
use crate::config::{EngineConfig, PrevAnchor};
use crate::hint::ReadHintCache;
use crate::plan::IoPlan;
use crate::query::{DateRange, ParseResult, QualifiedFile, ScanDirection};

use error::{ReverseRequiresLimitSnafu, ScanError};
use pack::{u64_le, PackEnv};
use variable::BufferMeta;

/// Cooperative cancellation flag for one scanner.
///
/// Cloning shares the flag; any clone can cancel. The scanner checks it at
/// segment and read-window boundaries and aborts with
/// [`ScanError::Cancelled`], releasing open file handles on the way out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Packed scan result for one bucket.
#[derive(Debug, Clone)]
pub struct BucketScan {
    /// Densely packed records; each starts with its epoch as little-endian
    /// u64. For variable-record buckets this is the resolved
    /// `{epoch, payload}` concatenation.
    pub data: Bytes,
    /// Epoch of the populated slot immediately preceding the first returned
    /// record, or 0 when none is available.
    pub t_prev: i64,
}

/// Executes one parsed query against the on-disk bucket files.
pub struct Scanner {
    plans: HashMap<TimeBucketKey, IoPlan>,
    read_buffer: Vec<u8>,
    file_buffer: Vec<u8>,
    records_per_read: usize,
    tz: Tz,
    prev_anchor: PrevAnchor,
    hints: ReadHintCache,
    cancel: CancelToken,
}

impl Scanner {
    /// Group the query's qualified files by bucket and build one plan per
    /// bucket. Fails if any bucket mixes record shapes.
    pub fn new(
        pr: ParseResult,
        hints: ReadHintCache,
        config: &EngineConfig,
    ) -> Result<Self, ScanError> {
        let tz = config.timezone;
        let range = pr.range.unwrap_or_else(|| DateRange::all(tz));

        let mut grouped: HashMap<TimeBucketKey, Vec<QualifiedFile>> = HashMap::new();
        for qf in pr.qualified_files {
            grouped.entry(qf.key.clone()).or_default().push(qf);
        }

        let mut plans = HashMap::with_capacity(grouped.len());
        let mut max_record_len: i32 = 0;
        for (key, mut files) in grouped {
            files.sort_unstable_by_key(|qf| qf.file.year());
            let plan = IoPlan::build(&files, &range, pr.limit, &pr.time_quals, &hints, tz)?;
            max_record_len = max_record_len.max(plan.record_len);
            plans.insert(key, plan);
        }

        // Both scratch buffers hold a whole read chunk; sized by the widest
        // record across the query's plans.
        let records_per_read = config.records_per_read.max(1);
        let read_size = records_per_read * max_record_len.max(0) as usize;
        Ok(Scanner {
            plans,
            read_buffer: vec![0u8; read_size],
            file_buffer: Vec::with_capacity(read_size),
            records_per_read,
            tz,
            prev_anchor: config.prev_anchor,
            hints,
            cancel: CancelToken::new(),
        })
    }

    /// Token that aborts this scanner at the next segment or window
    /// boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute every bucket's plan and return the packed buffers. On any
    /// error the whole result is discarded.
    pub fn read_all(mut self) -> Result<HashMap<TimeBucketKey, BucketScan>, ScanError> {
        let plans = mem::take(&mut self.plans);
        let mut out = HashMap::with_capacity(plans.len());
        for (key, mut plan) in plans {
            let (data, t_prev) = self.read_plan(&mut plan)?;
            out.insert(key, BucketScan { data, t_prev });
        }
        Ok(out)
    }

    fn read_plan(&mut self, plan: &mut IoPlan) -> Result<(Bytes, i64), ScanError> {
        let limit_bytes = match plan.limit.rows {
            Some(rows) => i64::from(plan.record_len) * i64::from(rows),
            None => {
                ensure!(
                    plan.limit.direction != ScanDirection::Last,
                    ReverseRequiresLimitSnafu
                );
                i64::MAX
            }
        };
        match plan.limit.direction {
            ScanDirection::First | ScanDirection::Unset => self.read_forward(plan, limit_bytes),
            ScanDirection::Last => self.read_backward(plan, limit_bytes),
        }
    }

    /// Forward strategy: fill the result in plan order, then recover the
    /// previous timestamp from the prior segments.
    fn read_forward(
        &mut self,
        plan: &mut IoPlan,
        limit_bytes: i64,
    ) -> Result<(Bytes, i64), ScanError> {
        let record_len = plan.record_len;
        let rl = record_len as usize;
        let chunk = self.records_per_read * rl;
        let collect_meta = plan.record_type == RecordType::Variable;

        let read_buf = &mut self.read_buffer[..chunk];
        let env = PackEnv {
            record_len,
            tz: self.tz,
            quals: &plan.time_quals,
            hints: &self.hints,
            cancel: &self.cancel,
        };

        let mut result: Vec<u8> = Vec::with_capacity(chunk);
        let mut metas: Vec<BufferMeta> = Vec::new();

        for seg in plan.file_segments.iter_mut() {
            let before = result.len();
            pack::read_segment_forward(seg, &mut result, read_buf, &env)?;
            if collect_meta && result.len() > before {
                metas.push(BufferMeta {
                    path: seg.tbi.path().to_path_buf(),
                    data: before..result.len(),
                    var_rec_len: plan.variable_record_len,
                    intervals: seg.tbi.intervals(),
                });
            }
            if result.len() as i64 >= limit_bytes {
                result.truncate(limit_bytes as usize);
                let new_len = result.len();
                while metas.last().is_some_and(|m| m.data.start >= new_len) {
                    metas.pop();
                }
                if let Some(last) = metas.last_mut() {
                    last.data.end = last.data.end.min(new_len);
                }
                break;
            }
        }

        // Previous timestamp: the default anchors to the oldest prior
        // file's year start; a populated slot found walking newest-first
        // overrides it.
        let mut t_prev = 0i64;
        if let Some(oldest) = plan.prior_segments.last() {
            t_prev = match self.prev_anchor {
                PrevAnchor::MinuteBefore => oldest.base_time - 60,
                PrevAnchor::TimeframeBefore => oldest.base_time - oldest.tbi.timeframe().secs(),
            };
        }
        for seg in plan.prior_segments.iter_mut() {
            let mut prev_buf = vec![0u8; rl];
            let mut fill = i64::from(record_len);
            let bytes_read = pack::read_segment_backward(
                seg,
                &mut prev_buf,
                &mut fill,
                read_buf,
                &mut self.file_buffer,
                &env,
            )?;
            if fill == 0 {
                if bytes_read != 0 {
                    t_prev = u64_le(&prev_buf) as i64;
                }
                break;
            }
        }

        if collect_meta {
            let primary = Bytes::from(result);
            let resolved = variable::read_second_stage(&primary, &metas, record_len)?;
            return Ok((Bytes::from(resolved), t_prev));
        }
        Ok((Bytes::from(result), t_prev))
    }

    /// Reverse strategy: fill a fixed buffer tail-first, newest segment
    /// first. Requires a finite row limit; one extra record is read to
    /// carry the previous timestamp.
    fn read_backward(
        &mut self,
        plan: &mut IoPlan,
        limit_bytes: i64,
    ) -> Result<(Bytes, i64), ScanError> {
        let record_len = plan.record_len;
        let rl = record_len as usize;
        let chunk = self.records_per_read * rl;
        let collect_meta = plan.record_type == RecordType::Variable;

        let total = limit_bytes + i64::from(record_len);
        let mut final_buf = vec![0u8; total as usize];
        let mut fill = total;
        let mut metas: Vec<BufferMeta> = Vec::new();

        let read_buf = &mut self.read_buffer[..chunk];
        let env = PackEnv {
            record_len,
            tz: self.tz,
            quals: &plan.time_quals,
            hints: &self.hints,
            cancel: &self.cancel,
        };

        for seg in plan.file_segments.iter_mut().rev() {
            let fill_before = fill;
            let bytes_read = pack::read_segment_backward(
                seg,
                &mut final_buf,
                &mut fill,
                read_buf,
                &mut self.file_buffer,
                &env,
            )?;
            if collect_meta && bytes_read > 0 {
                metas.push(BufferMeta {
                    path: seg.tbi.path().to_path_buf(),
                    data: fill as usize..fill_before as usize,
                    var_rec_len: plan.variable_record_len,
                    intervals: seg.tbi.intervals(),
                });
            }
            if fill == 0 {
                break;
            }
        }

        // Trim the unfilled head; recorded ranges shift with it.
        let trim = fill as usize;
        let mut result = final_buf;
        result.drain(..trim);
        for m in &mut metas {
            m.data = (m.data.start - trim)..(m.data.end - trim);
        }
        // Contributions were recorded newest file first; restore
        // chronological order to match the buffer.
        metas.reverse();

        let mut t_prev = 0i64;
        if !result.is_empty() {
            t_prev = u64_le(&result) as i64;
            result.drain(..rl);
            for m in &mut metas {
                m.data = m.data.start.saturating_sub(rl)..m.data.end.saturating_sub(rl);
            }
        }

        if collect_meta {
            let primary = Bytes::from(result);
            let resolved = variable::read_second_stage(&primary, &metas, record_len)?;
            return Ok((Bytes::from(resolved), t_prev));
        }
        Ok((Bytes::from(result), t_prev))
    }
}
