// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::{Filesystem, FilesystemError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write(fs: &Filesystem, name: &str, len: usize) {
    std::fs::write(fs.path().join(name), vec![0u8; len]).unwrap();
}

#[tokio::test]
async fn usage_sums_files_recursively() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path(), 0, Duration::from_secs(60)).unwrap();
    write(&fs, "a.bin", 100);
    std::fs::create_dir_all(fs.path().join("world")).unwrap();
    std::fs::write(fs.path().join("world/b.bin"), vec![0u8; 50]).unwrap();

    assert_eq!(fs.cached_usage(false).await.unwrap(), 150);
}

#[tokio::test]
async fn fresh_cache_skips_the_walk() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path(), 0, Duration::from_secs(60)).unwrap();
    write(&fs, "a.bin", 100);
    assert_eq!(fs.cached_usage(false).await.unwrap(), 100);

    // growth is invisible until the window lapses
    write(&fs, "b.bin", 100);
    assert_eq!(fs.cached_usage(false).await.unwrap(), 100);
}

#[tokio::test]
async fn stale_cache_recomputes() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path(), 0, Duration::from_millis(0)).unwrap();
    write(&fs, "a.bin", 100);
    assert_eq!(fs.cached_usage(false).await.unwrap(), 100);

    write(&fs, "b.bin", 100);
    assert_eq!(fs.cached_usage(false).await.unwrap(), 200);
}

#[tokio::test]
async fn allow_stale_returns_previous_value_without_walking() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path(), 0, Duration::from_millis(0)).unwrap();
    write(&fs, "a.bin", 100);
    assert_eq!(fs.cached_usage(false).await.unwrap(), 100);

    write(&fs, "b.bin", 100);
    assert_eq!(fs.cached_usage(true).await.unwrap(), 100);
}

#[tokio::test]
async fn allow_stale_still_computes_the_first_time() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path(), 0, Duration::from_secs(60)).unwrap();
    write(&fs, "a.bin", 42);
    assert_eq!(fs.cached_usage(true).await.unwrap(), 42);
}

#[tokio::test]
async fn concurrent_callers_observe_one_result() {
    let tmp = TempDir::new().unwrap();
    let fs = Arc::new(Filesystem::new(tmp.path(), 0, Duration::from_secs(60)).unwrap());
    write(&fs, "a.bin", 1000);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let fs = Arc::clone(&fs);
            tokio::spawn(async move { fs.cached_usage(false).await })
        })
        .collect();

    for task in tasks {
        let usage: Result<i64, FilesystemError> = task.await.unwrap();
        assert_eq!(usage.unwrap(), 1000);
    }
}
