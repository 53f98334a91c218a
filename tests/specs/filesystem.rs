// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem safety scenarios: traversal refusal and quota pre-flight.

use roost_daemon::{Filesystem, FilesystemError};
use std::time::Duration;
use tempfile::TempDir;

const MIB: i64 = 1024 * 1024;

fn tar_with_entry(dir: &std::path::Path, name: &str, entry: &str, data: &[u8]) {
    let file = std::fs::File::create(dir.join(name)).unwrap();
    let mut builder = tar::Builder::new(file);
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, entry, data).unwrap();
    builder.finish().unwrap();
}

#[tokio::test]
async fn zip_slip_refusal() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path().join("data"), 0, Duration::from_secs(60)).unwrap();
    std::fs::create_dir_all(fs.path().join("uploads")).unwrap();
    tar_with_entry(
        &fs.path().join("uploads"),
        "evil.tar",
        "../../etc/passwd",
        b"root::0:0:root:/root:/bin/sh",
    );

    let err = fs.decompress_file("uploads", "evil.tar").await.unwrap_err();

    assert!(matches!(err, FilesystemError::ZipSlip { .. }));
    // nothing escaped: neither inside the root nor next to it
    assert!(!fs.path().join("etc/passwd").exists());
    assert!(!tmp.path().join("etc/passwd").exists());
}

#[tokio::test]
async fn quota_blocks_oversized_decompression() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path().join("data"), 100 * MIB, Duration::from_secs(60)).unwrap();

    // 60 MiB of existing data, an archive that expands to 50 MiB
    std::fs::write(fs.path().join("world.bin"), vec![0u8; 60 * MIB as usize]).unwrap();
    std::fs::create_dir_all(fs.path().join("uploads")).unwrap();
    tar_with_entry(
        &fs.path().join("uploads"),
        "world.tar",
        "restore/world.bin",
        &vec![0u8; 50 * MIB as usize],
    );

    let allowed = fs
        .space_available_for_decompression("uploads", "world.tar")
        .await
        .unwrap();

    assert!(!allowed);

    // extraction refuses outright for the same reason
    let err = fs.decompress_file("uploads", "world.tar").await.unwrap_err();
    assert!(matches!(err, FilesystemError::QuotaExceeded));
    assert!(!fs.path().join("uploads/restore/world.bin").exists());
}

#[tokio::test]
async fn preflight_admits_archives_that_fit() {
    let tmp = TempDir::new().unwrap();
    let fs = Filesystem::new(tmp.path().join("data"), 500 * MIB, Duration::from_secs(60)).unwrap();
    std::fs::create_dir_all(fs.path().join("uploads")).unwrap();
    tar_with_entry(
        &fs.path().join("uploads"),
        "small.tar",
        "config.yml",
        b"maps: []",
    );

    assert!(fs
        .space_available_for_decompression("uploads", "small.tar")
        .await
        .unwrap());

    fs.decompress_file("uploads", "small.tar").await.unwrap();
    assert!(fs.path().join("uploads/config.yml").exists());
}
