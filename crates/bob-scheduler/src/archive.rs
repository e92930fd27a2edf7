// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Packing a step's result workspace into the gzipped tar payload the
//! artifact cache stores and serves, and unpacking one back onto disk on
//! a cache hit (spec.md §4.6 "Artifact archive layout": a `content/` tree
//! plus `meta/audit.json.gz`). Grounded on the teacher's
//! `TarRepository::flush`/`open` (`spfs::storage::tar::repository`):
//! `tar::Builder::append_dir_all` to pack, `tar::Archive::unpack` to a
//! staging directory to unpack.

use std::io::Write;
use std::path::Path;

use bob_cache::ArtifactBundle;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Tar `work_dir` under `content/` plus the already-written audit record
/// at `audit_record_path` under `meta/audit.json.gz`, gzip the result,
/// and return it ready for [`bob_cache::Cache::upload`].
pub fn pack(work_dir: &Path, audit_record_path: &Path) -> Result<ArtifactBundle> {
    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_dir_all("content", work_dir)
        .map_err(|e| Error::Io { action: "tar", path: work_dir.to_path_buf(), source: e })?;

    let record_bytes = std::fs::read(audit_record_path)
        .map_err(|e| Error::Io { action: "read", path: audit_record_path.to_path_buf(), source: e })?;
    let mut header = tar::Header::new_gnu();
    header.set_size(record_bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "meta/audit.json.gz", record_bytes.as_slice())
        .map_err(|e| Error::Io { action: "tar", path: audit_record_path.to_path_buf(), source: e })?;

    let tar_bytes = builder
        .into_inner()
        .map_err(|e| Error::Io { action: "tar", path: work_dir.to_path_buf(), source: e })?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_bytes)
        .map_err(|e| Error::Io { action: "compress", path: work_dir.to_path_buf(), source: e })?;
    let compressed =
        encoder.finish().map_err(|e| Error::Io { action: "compress", path: work_dir.to_path_buf(), source: e })?;
    Ok(ArtifactBundle::new(compressed))
}

/// Extract a downloaded bundle's `content/` tree into `dest`, overwriting
/// anything already there (spec.md §4.5 `Downloading`: "extract + verify").
/// Unpacks the full archive to a scratch directory first, the same way
/// the teacher unpacks a whole tar repository before touching it, since
/// `tar::Archive` only ever extracts everything or nothing at once.
pub fn unpack_content(bundle: &ArtifactBundle, dest: &Path) -> Result<()> {
    let staging = tempfile::tempdir().map_err(|e| Error::Io { action: "create", path: dest.to_path_buf(), source: e })?;

    let decoder = GzDecoder::new(bundle.bytes.as_slice());
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(staging.path())
        .map_err(|e| Error::Io { action: "untar", path: dest.to_path_buf(), source: e })?;

    copy_tree(&staging.path().join("content"), dest)
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).map_err(|e| Error::Io { action: "create", path: dest.to_path_buf(), source: e })?;
    for entry in std::fs::read_dir(src).map_err(|e| Error::Io { action: "read", path: src.to_path_buf(), source: e })? {
        let entry = entry.map_err(|e| Error::Io { action: "read", path: src.to_path_buf(), source: e })?;
        let file_type =
            entry.file_type().map_err(|e| Error::Io { action: "stat", path: entry.path(), source: e })?;
        let target = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| Error::Io { action: "copy", path: target, source: e })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod archive_test {
    use super::*;

    #[test]
    fn pack_then_unpack_round_trips_workspace_contents() {
        let work_dir = tempfile::tempdir().unwrap();
        std::fs::write(work_dir.path().join("output.txt"), b"hello").unwrap();
        std::fs::create_dir(work_dir.path().join("nested")).unwrap();
        std::fs::write(work_dir.path().join("nested").join("inner.txt"), b"world").unwrap();

        let audit_dir = tempfile::tempdir().unwrap();
        let record_path = audit_dir.path().join("record.json.gz");
        std::fs::write(&record_path, b"not-really-gzip-but-opaque-to-this-test").unwrap();

        let bundle = pack(work_dir.path(), &record_path).unwrap();
        assert_eq!(&bundle.bytes[..2], &[0x1f, 0x8b], "must be written as real gzip data");

        let dest = tempfile::tempdir().unwrap();
        unpack_content(&bundle, dest.path()).unwrap();

        assert_eq!(std::fs::read(dest.path().join("output.txt")).unwrap(), b"hello");
        assert_eq!(std::fs::read(dest.path().join("nested").join("inner.txt")).unwrap(), b"world");
    }
}
