// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server filesystem guard.
//!
//! Every path the daemon touches on behalf of a server must be proven to
//! resolve under that server's data root after full symlink resolution;
//! [`Filesystem::safe_path`] is the only door. The guard also accounts
//! disk usage against the server's quota and performs archive pre-flight
//! checks and safe decompression.

mod archive;
mod disk;

use disk::UsageCache;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors from filesystem guard operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("path {path:?} resolves outside of the server data directory")]
    BadPathResolution { path: PathBuf },

    #[error("archive entry {entry:?} escapes the extraction root")]
    ZipSlip { entry: String },

    #[error("decompressing the archive would exceed the server disk quota")]
    QuotaExceeded,

    #[error("unreadable archive: {0}")]
    Archive(String),

    #[error("filesystem walk aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Guarded view of one server's data directory.
pub struct Filesystem {
    root: PathBuf,
    disk_limit: AtomicI64,
    usage: UsageCache,
}

impl Filesystem {
    /// Open (creating if necessary) the data root and fix the containment
    /// boundary to its fully resolved location.
    ///
    /// `disk_limit` is in bytes, 0 for unlimited. `check_interval` is the
    /// freshness window of the cached disk usage.
    pub fn new(
        root: impl Into<PathBuf>,
        disk_limit: i64,
        check_interval: Duration,
    ) -> Result<Self, FilesystemError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = std::fs::canonicalize(&root)?;
        Ok(Self {
            root,
            disk_limit: AtomicI64::new(disk_limit),
            usage: UsageCache::new(check_interval),
        })
    }

    /// The resolved data root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Disk quota in bytes; 0 means unlimited.
    pub fn disk_limit(&self) -> i64 {
        self.disk_limit.load(Ordering::Relaxed)
    }

    /// Update the quota after a configuration sync.
    pub fn set_disk_limit(&self, bytes: i64) {
        self.disk_limit.store(bytes, Ordering::Relaxed);
    }

    /// Resolve `path` to an absolute location proven to live under the
    /// data root.
    ///
    /// Absolute inputs are treated as root-relative, which also makes the
    /// function idempotent over its own output. The terminal component may
    /// not exist yet; its closest existing ancestor must still resolve
    /// inside the root after symlink expansion.
    pub fn safe_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, FilesystemError> {
        resolve_safe(&self.root, path.as_ref())
    }
}

/// Shared implementation of [`Filesystem::safe_path`], free of `&self` so
/// blocking archive walks can carry just the root.
fn resolve_safe(root: &Path, path: &Path) -> Result<PathBuf, FilesystemError> {
    let bad = || FilesystemError::BadPathResolution {
        path: path.to_path_buf(),
    };

    let relative = if path.is_absolute() {
        path.strip_prefix(root)
            .or_else(|_| path.strip_prefix("/"))
            .map_err(|_| bad())?
    } else {
        path
    };

    // Lexical normalization first: `..` may not climb past the root.
    let mut joined = root.to_path_buf();
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(c) => {
                joined.push(c);
                depth += 1;
            }
            Component::ParentDir => {
                if depth == 0 {
                    return Err(bad());
                }
                joined.pop();
                depth -= 1;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return Err(bad()),
        }
    }

    // Symlink resolution on the deepest existing ancestor; the missing
    // suffix is appended verbatim.
    let resolved = resolve_existing(&joined)?;
    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        Err(bad())
    }
}

fn resolve_existing(path: &Path) -> Result<PathBuf, FilesystemError> {
    let mut base = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    loop {
        match std::fs::canonicalize(&base) {
            Ok(mut resolved) => {
                for component in tail.iter().rev() {
                    resolved.push(component);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let (name, parent) = match (base.file_name(), base.parent()) {
                    (Some(name), Some(parent)) => (name.to_os_string(), parent.to_path_buf()),
                    _ => return Err(err.into()),
                };
                tail.push(name);
                base = parent;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
