// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Persisting and loading audit records as gzipped JSON (spec.md §4.7,
//! §6: "Stored as gzipped JSON").

use std::io::{Read, Write};
use std::path::Path;

use bob_ident::ArtifactId;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::types::{AuditRecord, DependencyRefs};

/// The transitive closure of artifacts this step's direct dependencies
/// reach, plus those direct dependencies themselves (spec.md §6:
/// top-level `references[]`). `resolved` supplies each direct
/// dependency's own already-written record so its closure doesn't need
/// to be re-walked from scratch.
pub fn build_references(
    direct: &DependencyRefs,
    resolved: impl Fn(&ArtifactId) -> Option<AuditRecord>,
) -> Vec<ArtifactId> {
    let mut seen = std::collections::BTreeSet::new();
    for artifact in direct.all() {
        if seen.insert(artifact.clone()) {
            if let Some(record) = resolved(artifact) {
                for transitive in record.references {
                    seen.insert(transitive);
                }
            }
        }
    }
    seen.into_iter().collect()
}

/// Write `record` to `path` as gzip-compressed JSON, atomically (a
/// temporary file written then renamed into place, so a reader never
/// observes a partially written record).
#[instrument(skip(record), fields(artifact = %record.artifact))]
pub fn write_record(path: &Path, record: &AuditRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Io { action: "create", path: parent.to_path_buf(), source: e })?;
    }
    let json = serde_json::to_vec(record).expect("AuditRecord serialization cannot fail");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| Error::Io { action: "compress", path: path.to_path_buf(), source: e })?;
    let compressed = encoder
        .finish()
        .map_err(|e| Error::Io { action: "compress", path: path.to_path_buf(), source: e })?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, compressed)
        .map_err(|e| Error::Io { action: "write", path: tmp.clone(), source: e })?;
    std::fs::rename(&tmp, path).map_err(|e| Error::Io { action: "rename", path: path.to_path_buf(), source: e })
}

/// Read and decompress an audit record previously written by
/// [`write_record`]. Unknown fields (from a newer bob version) are
/// silently ignored, since [`AuditRecord`] is not `deny_unknown_fields`
/// (spec.md §4.7 forward-compatibility rule).
#[instrument]
pub fn read_record(path: &Path) -> Result<AuditRecord> {
    let compressed = std::fs::read(path).map_err(|e| Error::Io { action: "read", path: path.to_path_buf(), source: e })?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| Error::Io { action: "decompress", path: path.to_path_buf(), source: e })?;
    serde_json::from_slice(&json).map_err(|e| Error::Malformed(path.to_path_buf(), e))
}

#[cfg(test)]
mod recorder_test {
    use super::*;
    use crate::types::{BuildHost, Meta};
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
    use bob_ident::{BuildId, VariantId};

    fn sample_record(seed: &str) -> AuditRecord {
        let digest = CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish();
        let build_id = BuildId::new_static(digest.clone());
        AuditRecord {
            artifact: ArtifactId::from(&build_id),
            variant_id: VariantId::from_digest(digest),
            build_id,
            result_hash: "deadbeef".to_string(),
            references: Vec::new(),
            env: Default::default(),
            meta_env: Default::default(),
            scms: Vec::new(),
            dependencies: DependencyRefs::default(),
            meta: Meta {
                recipe: "widget".to_string(),
                step: "build".to_string(),
                package: "widget".to_string(),
                bob_version: "1.4.0".to_string(),
                script_language: "bash".to_string(),
                jenkins: None,
            },
            build: BuildHost { host_name: "ci-1".to_string(), user_name: "bob".to_string(), os: None },
        }
    }

    #[test]
    fn record_round_trips_through_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.json.gz");
        let record = sample_record("widget");
        write_record(&path, &record).unwrap();

        let compressed = std::fs::read(&path).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b], "must be written as real gzip data");

        let loaded = read_record(&path).unwrap();
        assert_eq!(loaded.artifact, record.artifact);
        assert_eq!(loaded.meta.recipe, "widget");
    }

    #[test]
    fn unknown_fields_from_a_newer_bob_version_are_ignored() {
        let mut value = serde_json::to_value(sample_record("widget")).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("futureField".to_string(), serde_json::json!("unused"));
        let parsed: Result<AuditRecord> =
            serde_json::from_value(value).map_err(|e| Error::Malformed("<memory>".into(), e));
        assert!(parsed.is_ok());
    }

    #[test]
    fn build_references_includes_direct_and_transitive_artifacts() {
        let dep = sample_record("dep");
        let mut grandparent = sample_record("grandparent");
        grandparent.references = vec![dep.artifact.clone()];

        let mut direct = DependencyRefs::default();
        direct.args.push(grandparent.artifact.clone());

        let store = std::collections::BTreeMap::from([(grandparent.artifact.clone(), grandparent.clone())]);
        let refs = build_references(&direct, |id| store.get(id).cloned());

        assert!(refs.contains(&grandparent.artifact));
        assert!(refs.contains(&dep.artifact));
    }
}
