// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The shared-location pool for `shared: true` packages in release/Jenkins
//! mode (spec.md §4.4): installs keyed by Artifact-Id into a pool with an
//! LRU-by-last-used quota, removed via atomic symlink swap then delete.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bob_ident::ArtifactId;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoolEntry {
    store_dir: String,
    last_used_epoch: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PoolData {
    #[serde(default)]
    entries: BTreeMap<String, PoolEntry>,
}

/// A quota-bounded, LRU-evicted pool of shared install directories keyed
/// by [`ArtifactId`]. `root` holds one symlink per live entry (named by
/// the artifact's hex digest) pointing into a `store/` subdirectory that
/// holds the real contents; this indirection is what makes eviction
/// atomic (spec.md invariant: "Removal of a shared location entry is
/// atomic (symlink swap then delete)").
pub struct SharedPool {
    root: PathBuf,
    quota: usize,
    data: PoolData,
    manifest_path: PathBuf,
}

impl SharedPool {
    pub fn open(root: impl Into<PathBuf>, quota: usize) -> Result<Self> {
        let root = root.into();
        let manifest_path = root.join("pool-manifest.json");
        let data = match std::fs::read(&manifest_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::CorruptLedger(manifest_path.clone(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PoolData::default(),
            Err(e) => return Err(Error::Io { action: "read", path: manifest_path.clone(), source: e }),
        };
        Ok(Self { root, quota, data, manifest_path })
    }

    fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| Error::Io { action: "create", path: self.root.clone(), source: e })?;
        let serialized = serde_json::to_vec_pretty(&self.data).expect("PoolData serialization cannot fail");
        std::fs::write(&self.manifest_path, serialized)
            .map_err(|e| Error::Io { action: "write", path: self.manifest_path.clone(), source: e })
    }

    /// Returns the pool's live symlink path for `artifact`, building it
    /// via `install` if this is the first time this artifact has been
    /// requested. Touches the entry's last-used time either way, then
    /// evicts over-quota entries (oldest first).
    pub fn acquire(&mut self, artifact: &ArtifactId, install: impl FnOnce(&Path) -> Result<()>) -> Result<PathBuf> {
        let key = artifact.to_hex();
        let link = self.root.join(&key);

        if !self.data.entries.contains_key(&key) {
            let store_dir = format!("store-{key}");
            let store_path = self.root.join(&store_dir);
            std::fs::create_dir_all(&store_path)
                .map_err(|e| Error::Io { action: "create", path: store_path.clone(), source: e })?;
            install(&store_path)?;

            if link.exists() || link.is_symlink() {
                std::fs::remove_file(&link).ok();
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(&store_dir, &link)
                .map_err(|e| Error::Io { action: "symlink", path: link.clone(), source: e })?;
            #[cfg(not(unix))]
            std::fs::write(&link, &store_dir)
                .map_err(|e| Error::Io { action: "symlink", path: link.clone(), source: e })?;

            self.data.entries.insert(key.clone(), PoolEntry { store_dir, last_used_epoch: now_epoch() });
        } else if let Some(entry) = self.data.entries.get_mut(&key) {
            entry.last_used_epoch = now_epoch();
        }

        self.evict_over_quota()?;
        self.save()?;
        Ok(link)
    }

    /// Evict least-recently-used entries beyond `quota`, atomically:
    /// the live symlink is renamed out of the way first, then its
    /// backing store directory is deleted. A reader that already
    /// resolved the symlink keeps working against the (now detached)
    /// store directory until it's done; no reader ever observes a
    /// dangling symlink.
    fn evict_over_quota(&mut self) -> Result<Vec<String>> {
        let mut evicted = Vec::new();
        if self.data.entries.len() <= self.quota {
            return Ok(evicted);
        }
        let mut by_age: Vec<(String, u64)> =
            self.data.entries.iter().map(|(k, e)| (k.clone(), e.last_used_epoch)).collect();
        by_age.sort_by_key(|(_, epoch)| *epoch);

        let overflow = self.data.entries.len() - self.quota;
        for (key, _) in by_age.into_iter().take(overflow) {
            let Some(entry) = self.data.entries.remove(&key) else { continue };
            let link = self.root.join(&key);
            let store_path = self.root.join(&entry.store_dir);
            let trash = self.root.join(format!("{}.trash", entry.store_dir));

            if link.exists() || link.is_symlink() {
                std::fs::remove_file(&link).ok();
            }
            if store_path.exists() {
                std::fs::rename(&store_path, &trash)
                    .map_err(|e| Error::Io { action: "rename", path: store_path.clone(), source: e })?;
                std::fs::remove_dir_all(&trash)
                    .map_err(|e| Error::Io { action: "remove", path: trash.clone(), source: e })?;
            }
            evicted.push(key);
        }
        Ok(evicted)
    }
}

fn now_epoch() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod shared_test {
    use super::*;
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};

    fn artifact(seed: &str) -> ArtifactId {
        let build_id = bob_ident::BuildId::new_static(
            CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish(),
        );
        ArtifactId::from(&build_id)
    }

    #[test]
    fn acquire_builds_once_and_reuses_on_second_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = SharedPool::open(dir.path(), 10).unwrap();
        let a = artifact("pkg-1.0");
        let mut builds = 0;
        pool.acquire(&a, |_| {
            builds += 1;
            Ok(())
        })
        .unwrap();
        pool.acquire(&a, |_| {
            builds += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(builds, 1, "second acquire must not rebuild an existing entry");
    }

    #[test]
    fn quota_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = SharedPool::open(dir.path(), 1).unwrap();
        let first = artifact("pkg-1.0");
        let second = artifact("pkg-2.0");

        let first_link = pool.acquire(&first, |_| Ok(())).unwrap();
        pool.acquire(&second, |_| Ok(())).unwrap();

        assert!(!first_link.exists(), "oldest entry must be evicted once quota is exceeded");
    }
}
