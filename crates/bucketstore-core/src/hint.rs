//! Advisory per-file read hints.
//!
//! The cache maps a year-file path to the byte offset of the last slot a
//! scan observed as populated. The planner uses it to stop a later scan
//! before the empty tail of a file that is still being appended to.
//!
//! The hint is strictly advisory: a stale or missing entry must only make a
//! scan read more (or stop earlier but never before the recorded slot), not
//! change its results. Updates therefore need no ordering beyond the map's
//! own consistency.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared map of `year-file path -> last known populated byte offset`.
///
/// Cloning is cheap and all clones observe the same map. The cache is passed
/// by value into the planner and scanner as an explicit collaborator; it is
/// not a process singleton, which keeps tests hermetic.
#[derive(Debug, Clone, Default)]
pub struct ReadHintCache {
    inner: Arc<RwLock<HashMap<PathBuf, i64>>>,
}

impl ReadHintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of the last slot known to be populated in `path`, if any scan
    /// has recorded one.
    pub fn last_known(&self, path: &Path) -> Option<i64> {
        // A panicked writer cannot corrupt an insert-only i64 map; recover
        // the lock rather than wedging every future scan.
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(path).copied()
    }

    /// Record `offset` as the last known populated slot of `path`.
    pub fn set_last_known(&self, path: &Path, offset: i64) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(path.to_path_buf(), offset);
    }
}
