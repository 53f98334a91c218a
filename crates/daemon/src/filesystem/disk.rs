// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached disk usage accounting.
//!
//! Walking a multi-gigabyte data directory is expensive, so the result is
//! cached with a freshness window and recomputation is singleflight:
//! concurrent callers share one in-flight walk and all observe its result.

use super::{Filesystem, FilesystemError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

pub(super) struct UsageCache {
    bytes: AtomicI64,
    checked_at: Mutex<Option<Instant>>,
    /// Held for the duration of a recomputation; queued waiters re-check
    /// freshness after acquiring so a single walk serves them all.
    flight: tokio::sync::Mutex<()>,
    interval: Duration,
}

impl UsageCache {
    pub(super) fn new(interval: Duration) -> Self {
        Self {
            bytes: AtomicI64::new(0),
            checked_at: Mutex::new(None),
            flight: tokio::sync::Mutex::new(()),
            interval,
        }
    }

    fn fresh(&self) -> bool {
        self.checked_at
            .lock()
            .is_some_and(|at| at.elapsed() < self.interval)
    }

    fn has_value(&self) -> bool {
        self.checked_at.lock().is_some()
    }

    fn bytes(&self) -> i64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn store(&self, total: i64) {
        self.bytes.store(total, Ordering::Relaxed);
        *self.checked_at.lock() = Some(Instant::now());
    }
}

impl Filesystem {
    /// Byte count of everything under the data root.
    ///
    /// Returns the cached value while it is fresh, or — with `allow_stale`
    /// — whenever one exists at all. Otherwise walks the tree on a
    /// blocking thread; concurrent callers coalesce onto one walk.
    pub async fn cached_usage(&self, allow_stale: bool) -> Result<i64, FilesystemError> {
        if self.usage.fresh() || (allow_stale && self.usage.has_value()) {
            return Ok(self.usage.bytes());
        }

        let _flight = self.usage.flight.lock().await;
        if self.usage.fresh() {
            // someone else recomputed while we queued
            return Ok(self.usage.bytes());
        }

        let root = self.path().to_path_buf();
        let total = tokio::task::spawn_blocking(move || walk_usage(&root)).await??;
        self.usage.store(total);
        Ok(total)
    }
}

/// Sum of file sizes under `root`, not following symlinks.
fn walk_usage(root: &Path) -> std::io::Result<i64> {
    let mut total = 0i64;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else if metadata.is_file() {
                total += metadata.len() as i64;
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
#[path = "disk_tests.rs"]
mod tests;
