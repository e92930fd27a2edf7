// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The `file(path)` backend (spec.md §4.6): a plain directory tree laid
//! out with the two-level hex fan-out shared by every backend variant.

use std::path::{Path, PathBuf};

use bob_ident::{ArtifactId, BuildId};
use tracing::instrument;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{ArtifactBundle, BackendFlags};

/// `<root>/<hh>/<hh>/<hexid>-1.tgz`. Shared by every backend variant
/// (spec.md §4.6 "Keying"); `ArtifactId::storage_stem` already implements
/// the fan-out split, and since an `ArtifactId` is just a `BuildId`'s
/// digest this also gives the hex-Build-Id-keyed layout the contract asks
/// for downloads.
fn artifact_path(root: &Path, artifact_id: &ArtifactId) -> PathBuf {
    root.join(format!("{}-1.tgz", artifact_id.storage_stem()))
}

pub struct FileBackend {
    root: PathBuf,
    flags: BackendFlags,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>, flags: BackendFlags) -> Self {
        Self { root: root.into(), flags }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn flags(&self) -> BackendFlags {
        self.flags
    }

    #[instrument(skip(self), fields(backend = "file"))]
    fn try_download(&self, build_id: &BuildId) -> Result<Option<ArtifactBundle>> {
        let path = artifact_path(&self.root, &ArtifactId::from(build_id));
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(ArtifactBundle::new(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io { action: "read", path, source: e }),
        }
    }

    #[instrument(skip(self, bundle), fields(backend = "file", artifact = %artifact_id))]
    fn upload(&self, artifact_id: &ArtifactId, bundle: &ArtifactBundle) -> Result<()> {
        let path = artifact_path(&self.root, artifact_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io { action: "create", path: parent.to_path_buf(), source: e })?;
        }
        // PUT-and-rename-or-equivalent atomic placement (spec.md §4.6
        // "Atomicity"): write to a temp file in the same directory, then
        // rename, so a concurrent reader never observes a partial upload.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bundle.bytes)
            .map_err(|e| Error::Io { action: "write", path: tmp.clone(), source: e })?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::Io { action: "rename", path, source: e })
    }

    fn remove(&self, build_id: &BuildId) -> Result<()> {
        let path = artifact_path(&self.root, &ArtifactId::from(build_id));
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io { action: "remove", path, source: e }),
        }
    }
}

#[cfg(test)]
mod file_backend_test {
    use super::*;
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};

    fn build_id(seed: &str) -> BuildId {
        BuildId::new_static(CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish())
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path(), BackendFlags::rw());
        let id = build_id("widget-package");
        let artifact_id = ArtifactId::from(&id);

        assert!(backend.try_download(&id).unwrap().is_none());
        backend.upload(&artifact_id, &ArtifactBundle::new(vec![1, 2, 3])).unwrap();
        let bundle = backend.try_download(&id).unwrap().unwrap();
        assert_eq!(bundle.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn lays_out_two_level_hex_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path(), BackendFlags::rw());
        let id = build_id("widget-package");
        let artifact_id = ArtifactId::from(&id);
        backend.upload(&artifact_id, &ArtifactBundle::new(vec![9])).unwrap();

        let expected = dir.path().join(format!("{}-1.tgz", artifact_id.storage_stem()));
        assert!(expected.is_file());
    }

    #[test]
    fn remove_is_idempotent_on_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path(), BackendFlags::rw());
        let id = build_id("ghost");
        assert!(backend.remove(&id).is_ok());
    }
}
