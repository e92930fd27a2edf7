// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Content-hash verification (spec.md §4.6 "Verification"): a downloaded
//! bundle's content hash is recomputed and compared against the audit
//! trail's `result-hash` before it is trusted.

use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};

use crate::types::ArtifactBundle;

/// Recompute the content hash of `bundle` the same way the executor
/// computed `result-hash` when it was first uploaded: a single
/// length-prefixed field over the raw bytes.
pub fn content_hash(bundle: &ArtifactBundle) -> String {
    CanonicalHasher::new(HashAlgorithm::CURRENT).update(&bundle.bytes).finish().to_hex()
}

pub fn matches_result_hash(bundle: &ArtifactBundle, expected_result_hash: &str) -> bool {
    content_hash(bundle) == expected_result_hash
}

#[cfg(test)]
mod verify_test {
    use super::*;

    #[test]
    fn matching_bytes_verify() {
        let bundle = ArtifactBundle::new(vec![1, 2, 3]);
        let hash = content_hash(&bundle);
        assert!(matches_result_hash(&bundle, &hash));
    }

    #[test]
    fn tampered_bytes_fail_verification() {
        let bundle = ArtifactBundle::new(vec![1, 2, 3]);
        let hash = content_hash(&bundle);
        let tampered = ArtifactBundle::new(vec![1, 2, 4]);
        assert!(!matches_result_hash(&tampered, &hash));
    }
}
