//! Second read stage for variable-length records.
//!
//! A primary pass over a variable-record file yields packed triplets
//! `{epoch: u64 LE, offset: u64 LE, length: u32 LE}`; the payload itself
//! lives in the `.vbin` companion file. This stage walks the per-file
//! buffer slices recorded during the primary pass, in chronological order,
//! and replaces each triplet with `{epoch, payload}`.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::ops::Range;
use std::path::PathBuf;

use bytes::Bytes;
use log::debug;
use snafu::prelude::*;

use crate::catalog;
use crate::scan::error::{OpenSnafu, ReadSnafu, ScanError, SeekSnafu, ShortReadSnafu};
use crate::scan::pack::{fill_chunk, u32_le, u64_le};

/// Byte offset of the companion-file offset within a primary record.
const TRIPLET_OFFSET_AT: usize = 8;
/// Byte offset of the element count within a primary record.
const TRIPLET_LENGTH_AT: usize = 16;

/// Indirect index into the packed primary buffer for one contributing file,
/// recorded during the primary pass and resolved here.
#[derive(Debug, Clone)]
pub(crate) struct BufferMeta {
    /// Year-file path; the companion is derived from it.
    pub(crate) path: PathBuf,
    /// This file's contribution within the primary buffer.
    pub(crate) data: Range<usize>,
    /// On-disk size of one companion-file element.
    pub(crate) var_rec_len: i32,
    /// Slots per day of the source file, carried for downstream row
    /// splitting.
    pub(crate) intervals: i64,
}

/// Resolve every triplet in `primary` to its payload, emitting
/// `{epoch, payload}` pairs in meta (chronological) order.
pub(crate) fn read_second_stage(
    primary: &Bytes,
    metas: &[BufferMeta],
    record_len: i32,
) -> Result<Vec<u8>, ScanError> {
    let rl = record_len as usize;
    let mut out = Vec::with_capacity(primary.len());

    for meta in metas {
        let companion = catalog::variable_data_path(&meta.path);
        let path = companion.display().to_string();
        let data = primary.slice(meta.data.clone());
        if data.is_empty() {
            continue;
        }
        debug!(
            "variable stage 2: {} records via {path} ({} intervals/day)",
            data.len() / rl,
            meta.intervals
        );
        let mut f = File::open(&companion).context(OpenSnafu { path: path.clone() })?;
        let elem_len = meta.var_rec_len as usize;

        for rec in data.chunks_exact(rl) {
            let offset = u64_le(&rec[TRIPLET_OFFSET_AT..]);
            let count = u32_le(&rec[TRIPLET_LENGTH_AT..]) as usize;
            let want = count * elem_len;

            f.seek(SeekFrom::Start(offset))
                .context(SeekSnafu { path: path.clone() })?;
            let mut payload = vec![0u8; want];
            let got = fill_chunk(&mut f, &mut payload)
                .context(ReadSnafu { path: path.clone() })?;
            if got < want {
                return ShortReadSnafu {
                    path,
                    got,
                    record_len: meta.var_rec_len,
                }
                .fail();
            }
            out.extend_from_slice(&rec[..8]);
            out.extend_from_slice(&payload);
        }
    }
    Ok(out)
}
