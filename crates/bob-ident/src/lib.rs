// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The implicit-versioning engine (spec.md §4.3): computes `Variant-Id`,
//! `Build-Id` (static and dynamic), `Artifact-Id` and `Package-Id`.
//!
//! This crate is deliberately decoupled from the graph instantiator
//! (`bob-graph`): it knows nothing about `Recipe`/`Package`/`Step` types,
//! only about the already-extracted, already-ordered primitive fields a
//! step contributes to its hash. The graph instantiator is responsible for
//! extracting those fields in the right order from its own `Step`
//! representation and calling into this crate; this mirrors the teacher
//! repository's split between its schema/spec crates and its dedicated
//! identity crate (`spk-schema-ident`, `spk-schema-foundation::ident_build`).

mod ids;
mod input;

pub use ids::{ArtifactId, BuildId, PackageId, VariantId};
pub use input::{Input, StepRole, ToolContribution, order_inputs};

use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
use bob_foundation::env::EnvMap;

/// Compute the `Variant-Id` of a step.
///
/// `H(script ‖ Σ{VariantId(t) ‖ RelPath(t) ‖ LibPaths(t) : t ∈ tools sorted
/// by name} ‖ env sorted by key ‖ Σ{VariantId(i) : i ∈ inputs in order})`
pub fn compute_variant_id(
    algorithm: HashAlgorithm,
    script: &str,
    tools: &[ToolContribution],
    env: &EnvMap,
    inputs: &[Input],
) -> VariantId {
    let mut sorted_tools = tools.to_vec();
    // Tools are sorted lexicographically by name (spec.md §4.3). When two
    // tools of the same name are exported by different providers the
    // implementer must additionally commit to a stable tie-break; we sort
    // by (name, rel_path) so ties never depend on insertion order.
    sorted_tools.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.rel_path.cmp(&b.rel_path)));

    let mut hasher = CanonicalHasher::new(algorithm);
    hasher.update(script.as_bytes());
    hasher.update(&(sorted_tools.len() as u64).to_le_bytes());
    for tool in &sorted_tools {
        hasher
            .update_digest(tool.variant_id.digest())
            .update(tool.rel_path.as_bytes())
            .update_seq(tool.lib_paths.iter().map(String::as_bytes));
    }
    hasher.update(&(env.len() as u64).to_le_bytes());
    for (key, value) in env.iter() {
        hasher.update(key.as_bytes()).update(value.as_hash_field());
    }
    hasher.update(&(inputs.len() as u64).to_le_bytes());
    for input in inputs {
        hasher.update_digest(input.variant_id().digest());
    }
    VariantId::from_digest(hasher.finish())
}

/// Compute the `Build-Id` of a deterministic checkout step from its
/// canonicalized SCM spec (spec.md §4.3: `H(canonical_scm_spec)`).
pub fn compute_deterministic_checkout_build_id(
    algorithm: HashAlgorithm,
    canonical_scm_spec: &str,
) -> BuildId {
    let mut hasher = CanonicalHasher::new(algorithm);
    hasher.update(canonical_scm_spec.as_bytes());
    BuildId::new_static(hasher.finish())
}

/// Attempt to compute the static `Build-Id` of a build/package step (or a
/// non-deterministic checkout whose SCM script is symbolic).
///
/// Returns `None` when any input is [`Input::PendingCheckout`], meaning at
/// least one dependency is an indeterministic checkout that has not yet
/// executed: per spec.md §4.3 the Build-Id is "dynamic" in that case and is
/// only defined after that checkout runs (see
/// [`finalize_dynamic_build_id`]).
pub fn compute_static_build_id(
    algorithm: HashAlgorithm,
    symbolic_script: &str,
    tools: &[ToolContribution],
    env: &EnvMap,
    inputs: &[Input],
    fingerprint: Option<&BuildId>,
) -> Option<BuildId> {
    if inputs.iter().any(Input::is_pending_checkout) {
        return None;
    }

    let mut sorted_tools = tools.to_vec();
    sorted_tools.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.rel_path.cmp(&b.rel_path)));

    let mut hasher = CanonicalHasher::new(algorithm);
    hasher.update(symbolic_script.as_bytes());
    hasher.update(&(sorted_tools.len() as u64).to_le_bytes());
    for tool in &sorted_tools {
        let Some(build_id) = tool.build_id.as_ref() else {
            // A tool sourced from a package whose own Build-Id is still
            // dynamic makes this step's Build-Id dynamic too.
            return None;
        };
        hasher
            .update_digest(build_id.digest())
            .update(tool.rel_path.as_bytes())
            .update_seq(tool.lib_paths.iter().map(String::as_bytes));
    }
    hasher.update(&(env.len() as u64).to_le_bytes());
    for (key, value) in env.iter() {
        hasher.update(key.as_bytes()).update(value.as_hash_field());
    }

    // Fingerprint, when present, is concatenated after the env block
    // (spec.md §4.3 "Fingerprint integration").
    if let Some(fp) = fingerprint {
        hasher.update(b"fingerprint").update_digest(fp.digest());
    } else {
        hasher.update(b"no-fingerprint");
    }

    hasher.update(&(inputs.len() as u64).to_le_bytes());
    for input in inputs {
        let Some(build_id) = input.build_id() else {
            return None;
        };
        hasher.update_digest(build_id.digest());
    }
    Some(BuildId::new_static(hasher.finish()))
}

/// Substitute a freshly-resolved checkout result hash for a pending
/// dependency's `Build-Id`, turning a dynamic Build-Id into a concrete one
/// (spec.md §4.3: `H(resultHash)` substitutes once the checkout executes).
pub fn finalize_dynamic_build_id(
    algorithm: HashAlgorithm,
    result_hash: &bob_foundation::digest::Digest,
) -> BuildId {
    let mut hasher = CanonicalHasher::new(algorithm);
    hasher.update_digest(&ids::digest_clone(result_hash));
    BuildId::new_dynamic(hasher.finish())
}

#[cfg(test)]
mod lib_test {
    use super::*;
    use bob_foundation::name::ToolName;

    fn tool(name: &str) -> ToolContribution {
        ToolContribution {
            name: ToolName::new_unchecked(name),
            variant_id: VariantId::from_digest(
                CanonicalHasher::new(HashAlgorithm::Sha256)
                    .update(name)
                    .finish()
                    .clone(),
            ),
            build_id: Some(BuildId::new_static(
                CanonicalHasher::new(HashAlgorithm::Sha256)
                    .update(name)
                    .finish(),
            )),
            rel_path: format!("bin/{name}"),
            lib_paths: vec![],
        }
    }

    #[test]
    fn variant_id_is_pure_function_of_its_inputs() {
        let env = EnvMap::new();
        let tools = vec![tool("gcc")];
        let a = compute_variant_id(HashAlgorithm::Sha256, "echo hi", &tools, &env, &[]);
        let b = compute_variant_id(HashAlgorithm::Sha256, "echo hi", &tools, &env, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn changing_script_changes_variant_id() {
        let env = EnvMap::new();
        let a = compute_variant_id(HashAlgorithm::Sha256, "echo hi", &[], &env, &[]);
        let b = compute_variant_id(HashAlgorithm::Sha256, "echo bye", &[], &env, &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn changing_env_changes_variant_id() {
        let mut env = EnvMap::new();
        env.set("X", "1");
        let a = compute_variant_id(HashAlgorithm::Sha256, "echo hi", &[], &EnvMap::new(), &[]);
        let b = compute_variant_id(HashAlgorithm::Sha256, "echo hi", &[], &env, &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn tool_order_does_not_affect_variant_id() {
        let env = EnvMap::new();
        let tools_a = vec![tool("gcc"), tool("make")];
        let tools_b = vec![tool("make"), tool("gcc")];
        let a = compute_variant_id(HashAlgorithm::Sha256, "build", &tools_a, &env, &[]);
        let b = compute_variant_id(HashAlgorithm::Sha256, "build", &tools_b, &env, &[]);
        assert_eq!(a, b, "sorting by tool name must make ordering irrelevant");
    }

    #[test]
    fn static_build_id_is_none_when_input_pending() {
        let result = compute_static_build_id(
            HashAlgorithm::Sha256,
            "build",
            &[],
            &EnvMap::new(),
            &[Input::PendingCheckout],
            None,
        );
        assert!(result.is_none());
    }

    #[test]
    fn deterministic_checkout_build_id_depends_only_on_scm_spec() {
        let a = compute_deterministic_checkout_build_id(HashAlgorithm::Sha256, "git@rev=abc");
        let b = compute_deterministic_checkout_build_id(HashAlgorithm::Sha256, "git@rev=abc");
        let c = compute_deterministic_checkout_build_id(HashAlgorithm::Sha256, "git@rev=def");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
