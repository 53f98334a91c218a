// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive pre-flight accounting and safe decompression.
//!
//! The container format is inferred from the file header (gzip and zip
//! magic bytes, plain tar otherwise). Every extracted entry is written
//! through the path guard; an entry whose declared target escapes the
//! data root aborts the extraction with [`FilesystemError::ZipSlip`].
//! Partial extractions are not rolled back — callers quarantine or delete.

use super::{resolve_safe, Filesystem, FilesystemError};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Tar,
    TarGz,
    Zip,
}

fn sniff_format(path: &Path) -> std::io::Result<ArchiveFormat> {
    let mut header = [0u8; 4];
    let mut file = File::open(path)?;
    let read = file.read(&mut header)?;
    if read >= 2 && header[..2] == [0x1f, 0x8b] {
        return Ok(ArchiveFormat::TarGz);
    }
    if read >= 4 && header == [b'P', b'K', 0x03, 0x04] {
        return Ok(ArchiveFormat::Zip);
    }
    Ok(ArchiveFormat::Tar)
}

impl Filesystem {
    /// Whether decompressing `file` (relative to `dir`) fits in the quota.
    ///
    /// Servers without a quota always pass. Otherwise the current usage
    /// (cached values allowed) and the sum of uncompressed entry sizes are
    /// computed concurrently, so total latency is the slower of the two.
    pub async fn space_available_for_decompression(
        &self,
        dir: &str,
        file: &str,
    ) -> Result<bool, FilesystemError> {
        let limit = self.disk_limit();
        if limit == 0 {
            return Ok(true);
        }

        let archive = self.safe_path(Path::new(dir).join(file))?;
        let walk = tokio::task::spawn_blocking(move || archive_total_size(&archive));
        let (usage, total) = tokio::join!(self.cached_usage(true), walk);
        Ok(usage? + total?? <= limit)
    }

    /// Extract `file` (relative to `dir`) into the directory it sits in,
    /// refusing up front when the expanded size would break the quota.
    pub async fn decompress_file(&self, dir: &str, file: &str) -> Result<(), FilesystemError> {
        if !self.space_available_for_decompression(dir, file).await? {
            return Err(FilesystemError::QuotaExceeded);
        }
        let destination = self.safe_path(dir)?;
        let archive = self.safe_path(Path::new(dir).join(file))?;
        let root = self.path().to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&root, &destination, &archive)).await?
    }
}

/// Sum of uncompressed entry sizes as declared by the archive.
fn archive_total_size(archive: &Path) -> Result<i64, FilesystemError> {
    let mut total = 0i64;
    match sniff_format(archive)? {
        ArchiveFormat::Tar => {
            let mut tar = tar::Archive::new(File::open(archive)?);
            for entry in tar.entries()? {
                total += entry?.header().size()? as i64;
            }
        }
        ArchiveFormat::TarGz => {
            let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
            for entry in tar.entries()? {
                total += entry?.header().size()? as i64;
            }
        }
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(File::open(archive)?)
                .map_err(|e| FilesystemError::Archive(e.to_string()))?;
            for index in 0..zip.len() {
                let entry = zip
                    .by_index(index)
                    .map_err(|e| FilesystemError::Archive(e.to_string()))?;
                total += entry.size() as i64;
            }
        }
    }
    Ok(total)
}

fn extract_archive(
    root: &Path,
    destination: &Path,
    archive: &Path,
) -> Result<(), FilesystemError> {
    match sniff_format(archive)? {
        ArchiveFormat::Tar => extract_tar(root, destination, File::open(archive)?),
        ArchiveFormat::TarGz => extract_tar(root, destination, GzDecoder::new(File::open(archive)?)),
        ArchiveFormat::Zip => extract_zip(root, destination, archive),
    }
}

fn extract_tar<R: Read>(
    root: &Path,
    destination: &Path,
    reader: R,
) -> Result<(), FilesystemError> {
    let mut tar = tar::Archive::new(reader);
    for entry in tar.entries()? {
        let mut entry = entry?;
        let declared = entry.path()?.into_owned();
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(guarded_target(root, destination, &declared)?)?;
        } else if kind.is_file() {
            let target = guarded_target(root, destination, &declared)?;
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
        }
        // links and special files are not materialized
    }
    Ok(())
}

fn extract_zip(root: &Path, destination: &Path, archive: &Path) -> Result<(), FilesystemError> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)
        .map_err(|e| FilesystemError::Archive(e.to_string()))?;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| FilesystemError::Archive(e.to_string()))?;
        let declared = PathBuf::from(entry.name());
        if entry.is_dir() {
            std::fs::create_dir_all(guarded_target(root, destination, &declared)?)?;
            continue;
        }
        let target = guarded_target(root, destination, &declared)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Resolve an entry's declared path under `destination`, converting a
/// containment failure into the archive-specific `ZipSlip` error.
fn guarded_target(
    root: &Path,
    destination: &Path,
    declared: &Path,
) -> Result<PathBuf, FilesystemError> {
    // absolute entry names stay relative to the extraction directory
    let declared_rel = declared.strip_prefix("/").unwrap_or(declared);
    resolve_safe(root, &destination.join(declared_rel)).map_err(|err| match err {
        FilesystemError::BadPathResolution { .. } => FilesystemError::ZipSlip {
            entry: declared.display().to_string(),
        },
        other => other,
    })
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
