// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The on-disk suffix ledger: persists which numeric suffix disambiguates
//! each (package/area, Variant-Id) pairing so repeated `acquire` calls
//! across process restarts stay stable (spec.md §4.4 invariant:
//! "Variant-Ids seen previously and still referenced keep their suffix").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    variant_id: String,
    suffix: u32,
    last_referenced_epoch: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerData {
    #[serde(default)]
    buckets: BTreeMap<String, Vec<LedgerEntry>>,
}

/// A persisted map from `(bucket, Variant-Id)` to a stable numeric
/// suffix. A bucket is a caller-chosen string identifying one
/// package/area pairing; within a bucket, each distinct Variant-Id gets
/// the smallest suffix not already in use by a sibling variant.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    data: LedgerData,
}

impl Ledger {
    /// Load the ledger from `path`, treating a missing file as empty.
    pub fn load(path: PathBuf) -> Result<Self> {
        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::CorruptLedger(path.clone(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerData::default(),
            Err(e) => {
                return Err(Error::Io { action: "read", path: path.clone(), source: e });
            }
        };
        Ok(Self { path, data })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io { action: "create", path: parent.to_path_buf(), source: e })?;
        }
        let serialized = serde_json::to_vec_pretty(&self.data)
            .expect("LedgerData serialization cannot fail");
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serialized)
            .map_err(|e| Error::Io { action: "write", path: tmp.clone(), source: e })?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Io { action: "rename", path: self.path.clone(), source: e })?;
        Ok(())
    }

    /// Return the stable suffix for `variant_id` within `bucket`,
    /// assigning and persisting a fresh one if this is the first time
    /// this variant has been seen in this bucket. Idempotent
    /// (spec.md §4.4: `acquire` is idempotent).
    pub fn suffix_for(&mut self, bucket: &str, variant_id: &str) -> u32 {
        let entries = self.data.buckets.entry(bucket.to_string()).or_default();
        if let Some(existing) = entries.iter_mut().find(|e| e.variant_id == variant_id) {
            existing.last_referenced_epoch = now_epoch();
            return existing.suffix;
        }
        let mut used: Vec<u32> = entries.iter().map(|e| e.suffix).collect();
        used.sort_unstable();
        let suffix = used.into_iter().enumerate().find(|(i, s)| *i as u32 != *s).map(|(i, _)| i as u32)
            .unwrap_or(entries.len() as u32);
        entries.push(LedgerEntry {
            variant_id: variant_id.to_string(),
            suffix,
            last_referenced_epoch: now_epoch(),
        });
        suffix
    }

    /// All `(bucket, variant_id, suffix)` triples currently tracked.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.data.buckets.iter().flat_map(|(bucket, entries)| {
            entries.iter().map(move |e| (bucket.as_str(), e.variant_id.as_str(), e.suffix))
        })
    }

    /// Drop the entry for `variant_id` within `bucket`, freeing its
    /// suffix for reuse by a future variant.
    pub fn forget(&mut self, bucket: &str, variant_id: &str) {
        if let Some(entries) = self.data.buckets.get_mut(bucket) {
            entries.retain(|e| e.variant_id != variant_id);
            if entries.is_empty() {
                self.data.buckets.remove(bucket);
            }
        }
    }
}

fn now_epoch() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod ledger_test {
    use super::*;

    fn ledger(dir: &Path) -> Ledger {
        Ledger::load(dir.join("ledger.json")).unwrap()
    }

    #[test]
    fn repeated_acquire_for_same_variant_keeps_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = ledger(dir.path());
        let a = l.suffix_for("app/src", "v1");
        let b = l.suffix_for("app/src", "v1");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_variants_in_same_bucket_get_distinct_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = ledger(dir.path());
        let a = l.suffix_for("app/src", "v1");
        let b = l.suffix_for("app/src", "v2");
        assert_ne!(a, b);
    }

    #[test]
    fn forgetting_a_variant_frees_its_suffix_for_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let mut l = ledger(dir.path());
        let first = l.suffix_for("app/src", "v1");
        l.suffix_for("app/src", "v2");
        l.forget("app/src", "v1");
        let reused = l.suffix_for("app/src", "v3");
        assert_eq!(reused, first);
    }

    #[test]
    fn ledger_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut l = Ledger::load(path.clone()).unwrap();
        l.suffix_for("app/src", "v1");
        l.save().unwrap();

        let reloaded = Ledger::load(path).unwrap();
        assert_eq!(reloaded.entries().count(), 1);
    }
}
