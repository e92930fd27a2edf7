// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The `Cache` contract (spec.md §4.6): ordered backend fan-out for
//! download, fan-out-to-all for upload, and cache-backfill, grounded on
//! the teacher's `PayloadFallback` repository's "consult primary, repair
//! from secondary" shape (`spfs::storage::payload_fallback::repository`).

use bob_audit::AuditRecord;
use bob_ident::{ArtifactId, BuildId};
use bob_query::{CleanQuery, QueryExpr};
use tracing::{instrument, warn};

use crate::backend::Backend;
use crate::error::Result;
use crate::maintenance;
use crate::types::ArtifactBundle;
use crate::verify;

pub struct Cache {
    backends: Vec<Box<dyn Backend>>,
}

impl Cache {
    pub fn new(backends: Vec<Box<dyn Backend>>) -> Self {
        Self { backends }
    }

    /// Try each download-flagged backend in declared order. A backend
    /// whose bundle fails verification is treated the same as a miss: try
    /// the next one. On success, backfill every `cache`-flagged backend
    /// that doesn't already have the artifact (spec.md §4.6 "Caching
    /// behavior").
    #[instrument(skip(self, expected_result_hash), fields(build_id = %build_id))]
    pub fn try_download(&self, build_id: &BuildId, expected_result_hash: &str) -> Result<Option<ArtifactBundle>> {
        for backend in self.backends.iter().filter(|b| b.flags().download) {
            match backend.try_download(build_id) {
                Ok(Some(bundle)) => {
                    if !verify::matches_result_hash(&bundle, expected_result_hash) {
                        warn!(backend = backend.name(), "downloaded artifact failed verification, discarding");
                        continue;
                    }
                    self.populate_cache_backends(build_id, &bundle)?;
                    return Ok(Some(bundle));
                }
                Ok(None) => continue,
                Err(e) if backend.flags().nofail => {
                    warn!(backend = backend.name(), error = %e, "download backend failed, continuing (nofail)");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Upload to every upload-flagged backend. A non-`nofail` backend's
    /// failure aborts immediately (spec.md §4.6: "non-nofail failures
    /// abort the build").
    #[instrument(skip(self, bundle), fields(artifact = %artifact_id))]
    pub fn upload(&self, artifact_id: &ArtifactId, bundle: &ArtifactBundle) -> Result<()> {
        for backend in self.backends.iter().filter(|b| b.flags().upload) {
            if let Err(e) = backend.upload(artifact_id, bundle) {
                if backend.flags().nofail {
                    warn!(backend = backend.name(), error = %e, "upload backend failed, continuing (nofail)");
                    continue;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn populate_cache_backends(&self, build_id: &BuildId, bundle: &ArtifactBundle) -> Result<()> {
        let artifact_id = ArtifactId::from(build_id);
        for backend in self.backends.iter().filter(|b| b.flags().cache) {
            match backend.try_download(build_id) {
                Ok(Some(_)) => continue,
                Ok(None) => backend.upload(&artifact_id, bundle)?,
                Err(e) if backend.flags().nofail => {
                    warn!(backend = backend.name(), error = %e, "cache backfill probe failed, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Whether any configured backend would actually receive an upload —
    /// lets a caller skip packaging a bundle entirely when there is
    /// nowhere for it to go (spec.md §4.6 `upload`).
    pub fn has_upload_backend(&self) -> bool {
        self.backends.iter().any(|b| b.flags().upload)
    }

    pub fn find<'a>(&self, records: &'a [AuditRecord], expr_src: &str) -> Result<Vec<&'a AuditRecord>> {
        let expr = QueryExpr::parse(expr_src)?;
        Ok(maintenance::find(records, &expr))
    }

    /// Select matching records, then remove their backing artifacts from
    /// every `managed` backend (the ones bob itself provisions and may
    /// prune; unmanaged mirrors are left untouched).
    pub fn clean(&self, records: &[AuditRecord], query_src: &str) -> Result<Vec<BuildId>> {
        let query = CleanQuery::parse(query_src)?;
        let selected = maintenance::select_for_clean(records, &query);
        let mut removed = Vec::with_capacity(selected.len());
        for record in selected {
            for backend in self.backends.iter().filter(|b| b.flags().managed) {
                backend.remove(&record.build_id)?;
            }
            removed.push(record.build_id.clone());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod cache_test {
    use super::*;
    use crate::file_backend::FileBackend;
    use crate::types::BackendFlags;
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};

    fn build_id(seed: &str) -> BuildId {
        BuildId::new_static(CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish())
    }

    #[test]
    fn try_download_falls_through_to_second_backend() {
        let empty = tempfile::tempdir().unwrap();
        let populated = tempfile::tempdir().unwrap();
        let id = build_id("widget");
        let artifact_id = ArtifactId::from(&id);
        let bundle = ArtifactBundle::new(vec![7, 7, 7]);
        let expected_hash = verify::content_hash(&bundle);

        FileBackend::new(populated.path(), BackendFlags::rw()).upload(&artifact_id, &bundle).unwrap();

        let cache = Cache::new(vec![
            Box::new(FileBackend::new(empty.path(), BackendFlags::download_only())),
            Box::new(FileBackend::new(populated.path(), BackendFlags::download_only())),
        ]);

        let found = cache.try_download(&id, &expected_hash).unwrap().unwrap();
        assert_eq!(found.bytes, vec![7, 7, 7]);
    }

    #[test]
    fn verification_mismatch_is_treated_as_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let id = build_id("widget");
        let artifact_id = ArtifactId::from(&id);
        let bundle = ArtifactBundle::new(vec![1, 2, 3]);
        FileBackend::new(dir.path(), BackendFlags::rw()).upload(&artifact_id, &bundle).unwrap();

        let cache = Cache::new(vec![Box::new(FileBackend::new(dir.path(), BackendFlags::download_only()))]);
        assert!(cache.try_download(&id, "not-the-real-hash").unwrap().is_none());
    }

    #[test]
    fn upload_backfills_cache_flagged_backend() {
        let primary = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        let id = build_id("widget");
        let artifact_id = ArtifactId::from(&id);
        let bundle = ArtifactBundle::new(vec![5, 5]);
        let expected_hash = verify::content_hash(&bundle);

        FileBackend::new(primary.path(), BackendFlags::rw()).upload(&artifact_id, &bundle).unwrap();

        let cache = Cache::new(vec![
            Box::new(FileBackend::new(primary.path(), BackendFlags::download_only())),
            Box::new(FileBackend::new(mirror.path(), BackendFlags { cache: true, ..BackendFlags::default() })),
        ]);
        cache.try_download(&id, &expected_hash).unwrap();

        let mirrored = FileBackend::new(mirror.path(), BackendFlags::download_only()).try_download(&id).unwrap();
        assert!(mirrored.is_some());
    }

    #[test]
    fn upload_aborts_on_non_nofail_backend_failure() {
        let missing_parent = std::path::PathBuf::from("/nonexistent-bob-cache-root/definitely-not-here");
        let cache = Cache::new(vec![Box::new(FileBackend::new(missing_parent, BackendFlags::rw()))]);
        let id = build_id("widget");
        let artifact_id = ArtifactId::from(&id);
        let result = cache.upload(&artifact_id, &ArtifactBundle::new(vec![1]));
        assert!(result.is_err());
    }
}
