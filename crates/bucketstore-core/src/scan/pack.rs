//! The packing reader: the shared primitive under both scan strategies.
//!
//! Year files are sparse slot arrays where a zero in-slot index marks a
//! hole. The packing reader streams a file region in record-multiple chunks,
//! drops holes, applies the query's time predicates, and appends surviving
//! slots to a dense output buffer with the leading 8 bytes rewritten from
//! in-slot index to absolute epoch seconds, so the buffer is self-describing
//! without file context.

use std::cmp;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use chrono_tz::Tz;
use snafu::prelude::*;

use crate::geometry;
use crate::hint::ReadHintCache;
use crate::plan::FileSegment;
use crate::query::TimeQual;
use crate::scan::error::{
    CancelledSnafu, OpenSnafu, ReadSnafu, ScanError, SeekSnafu, ShortReadSnafu,
};
use crate::scan::CancelToken;

/// Per-plan context threaded through every packing call.
pub(crate) struct PackEnv<'a> {
    pub(crate) record_len: i32,
    pub(crate) tz: Tz,
    pub(crate) quals: &'a [TimeQual],
    pub(crate) hints: &'a ReadHintCache,
    pub(crate) cancel: &'a CancelToken,
}

impl PackEnv<'_> {
    fn accepts(&self, epoch: i64) -> bool {
        self.quals.iter().all(|q| q(epoch))
    }
}

/// Little-endian u64 at the head of `b`.
pub(crate) fn u64_le(b: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[..8]);
    u64::from_le_bytes(raw)
}

/// Little-endian u32 at the head of `b`.
pub(crate) fn u32_le(b: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&b[..4]);
    u32::from_le_bytes(raw)
}

/// Read until `buf` is full or end-of-file.
pub(crate) fn fill_chunk<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Scan up to `max_read` bytes of `f` starting at file position `pos`,
/// appending packed records to `out`.
///
/// `f` must already be positioned at `pos`; the offset is passed so a
/// `seeking_last` segment can publish slot positions to the hint cache.
/// Stops at the byte budget or end-of-file; a read shorter than one record
/// is corruption.
///
/// The hint publishes the newest populated slot of the invocation,
/// qualifier-independent: a hint below the true tail would silently cut
/// records out of later scans, and the cache contract is that hints change
/// performance, never results.
pub(crate) fn packing_read(
    out: &mut Vec<u8>,
    f: &mut File,
    mut pos: i64,
    max_read: i64,
    read_buf: &mut [u8],
    seg: &mut FileSegment,
    env: &PackEnv<'_>,
) -> Result<(), ScanError> {
    let record_len = i64::from(env.record_len);
    let rl = env.record_len as usize;
    let path = seg.tbi.path().display().to_string();
    let mut total_read: i64 = 0;
    let mut last_populated: Option<i64> = None;

    loop {
        if env.cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }
        let want = cmp::min(read_buf.len() as i64, max_read - total_read);
        if want <= 0 {
            break;
        }
        let n = fill_chunk(f, &mut read_buf[..want as usize])
            .context(ReadSnafu { path: path.clone() })?;
        if n == 0 {
            break;
        }
        if n < rl {
            return ShortReadSnafu {
                path,
                got: n,
                record_len: env.record_len,
            }
            .fail();
        }
        total_read += n as i64;

        let num_records = n as i64 / record_len;
        for i in 0..num_records {
            let at = (i * record_len) as usize;
            let slot = &read_buf[at..at + rl];
            let index = u64_le(slot);
            if index == 0 {
                continue;
            }
            if seg.seeking_last {
                last_populated = Some(pos + i * record_len);
            }
            let epoch = geometry::index_to_epoch(
                index as i64,
                seg.tbi.timeframe(),
                seg.tbi.year(),
                env.tz,
            );
            if !env.accepts(epoch) {
                continue;
            }
            let idxpos = out.len();
            out.extend_from_slice(slot);
            out[idxpos..idxpos + 8].copy_from_slice(&epoch.to_le_bytes());
        }
        pos += n as i64;
        // A trailing partial record means the chunk hit end-of-file; the
        // next read would return nothing.
        if n as i64 % record_len != 0 {
            break;
        }
    }

    if let Some(offset) = last_populated {
        env.hints.set_last_known(seg.tbi.path(), offset);
        seg.seeking_last = false;
    }
    Ok(())
}

/// Open `seg`'s file and forward-pack its whole region into `out`.
pub(crate) fn read_segment_forward(
    seg: &mut FileSegment,
    out: &mut Vec<u8>,
    read_buf: &mut [u8],
    env: &PackEnv<'_>,
) -> Result<(), ScanError> {
    let path = seg.tbi.path().display().to_string();
    let mut f = File::open(seg.tbi.path()).context(OpenSnafu { path: path.clone() })?;
    f.seek(SeekFrom::Start(seg.offset as u64))
        .context(SeekSnafu { path })?;
    let (offset, length) = (seg.offset, seg.length);
    packing_read(out, &mut f, offset, length, read_buf, seg, env)
}

/// Scan `seg` right-to-left in windows of `read_buf.len()` bytes, packing
/// each window left-to-right and prepending its output into `final_buf`
/// ahead of the current fill point.
///
/// `fill` is the number of unfilled bytes remaining at the head of
/// `final_buf`; it decreases toward zero as windows land. A window that
/// overshoots the remaining budget contributes only its newest bytes and
/// leaves `fill` at zero. Returns the number of packed bytes this segment
/// produced (which may exceed what was kept).
pub(crate) fn read_segment_backward(
    seg: &mut FileSegment,
    final_buf: &mut [u8],
    fill: &mut i64,
    read_buf: &mut [u8],
    file_buf: &mut Vec<u8>,
    env: &PackEnv<'_>,
) -> Result<i64, ScanError> {
    let path = seg.tbi.path().display().to_string();
    let mut f = File::open(seg.tbi.path()).context(OpenSnafu { path: path.clone() })?;

    let window = read_buf.len() as i64;
    let right = seg.offset + seg.length;
    let mut win_end = right;
    let mut bytes_read: i64 = 0;

    loop {
        if env.cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }
        let win_start = cmp::max(seg.offset, win_end - window);
        let win_len = win_end - win_start;
        if win_len <= 0 {
            break;
        }
        f.seek(SeekFrom::Start(win_start as u64))
            .context(SeekSnafu { path: path.clone() })?;
        file_buf.clear();
        packing_read(file_buf, &mut f, win_start, win_len, read_buf, seg, env)?;

        let num_read = file_buf.len() as i64;
        if num_read != 0 {
            bytes_read += num_read;
            if num_read <= *fill {
                *fill -= num_read;
                let at = *fill as usize;
                final_buf[at..at + file_buf.len()].copy_from_slice(file_buf);
            } else {
                // Window crossed the budget: keep only its newest bytes.
                let keep = *fill as usize;
                let from = file_buf.len() - keep;
                final_buf[..keep].copy_from_slice(&file_buf[from..]);
                *fill = 0;
                break;
            }
        }
        if *fill == 0 || win_start == seg.offset {
            break;
        }
        win_end = win_start;
    }
    Ok(bytes_read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fill_chunk_completes_across_partial_reads() {
        // Cursor always satisfies the whole request, so drive the loop with
        // a reader that trickles bytes.
        struct Trickle(Cursor<Vec<u8>>);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let n = buf.len().min(3);
                self.0.read(&mut buf[..n])
            }
        }
        let mut r = Trickle(Cursor::new((0u8..32).collect()));
        let mut buf = [0u8; 20];
        assert_eq!(fill_chunk(&mut r, &mut buf).unwrap(), 20);
        assert_eq!(buf[0], 0);
        assert_eq!(buf[19], 19);
    }

    #[test]
    fn fill_chunk_stops_at_eof() {
        let mut r = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(fill_chunk(&mut r, &mut buf).unwrap(), 3);
        assert_eq!(fill_chunk(&mut r, &mut buf).unwrap(), 0);
    }
}
