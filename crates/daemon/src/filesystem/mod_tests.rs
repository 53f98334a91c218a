// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tempfile::TempDir;

fn guard(tmp: &TempDir) -> Filesystem {
    Filesystem::new(tmp.path().join("data"), 0, Duration::from_secs(60)).unwrap()
}

#[test]
fn safe_path_resolves_inside_root() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    let path = fs.safe_path("world/level.dat").unwrap();
    assert!(path.starts_with(fs.path()));
    assert!(path.ends_with("world/level.dat"));
}

#[test]
fn safe_path_allows_missing_terminal_component() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    // nothing under the root exists yet
    assert!(fs.safe_path("not/yet/created.txt").is_ok());
}

#[test]
fn safe_path_rejects_parent_traversal() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    let err = fs.safe_path("../../etc/passwd").unwrap_err();
    assert!(matches!(err, FilesystemError::BadPathResolution { .. }));
}

#[test]
fn safe_path_allows_interior_parent_components() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    let path = fs.safe_path("plugins/../world/level.dat").unwrap();
    assert!(path.ends_with("world/level.dat"));
}

#[test]
fn safe_path_rejects_symlink_escape() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    let outside = tmp.path().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, fs.path().join("sneaky")).unwrap();

    let err = fs.safe_path("sneaky/secret.txt").unwrap_err();
    assert!(matches!(err, FilesystemError::BadPathResolution { .. }));
}

#[test]
fn safe_path_follows_symlinks_that_stay_inside() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    std::fs::create_dir_all(fs.path().join("world_nether")).unwrap();
    std::os::unix::fs::symlink(fs.path().join("world_nether"), fs.path().join("nether")).unwrap();

    let path = fs.safe_path("nether/region.mca").unwrap();
    assert!(path.starts_with(fs.path().join("world_nether")));
}

#[test]
fn safe_path_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    let once = fs.safe_path("world/level.dat").unwrap();
    let twice = fs.safe_path(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn safe_path_treats_absolute_input_as_root_relative() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    let path = fs.safe_path("/world/level.dat").unwrap();
    assert_eq!(path, fs.safe_path("world/level.dat").unwrap());
}

#[test]
fn disk_limit_is_updatable() {
    let tmp = TempDir::new().unwrap();
    let fs = guard(&tmp);
    assert_eq!(fs.disk_limit(), 0);
    fs.set_disk_limit(1024);
    assert_eq!(fs.disk_limit(), 1024);
}
