// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use bob_foundation::name::ToolName;

use crate::ids::{BuildId, VariantId};

/// The role a step plays within its package, used to order its inputs
/// (spec.md §4.3 canonicalization rules).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StepRole {
    Checkout,
    Build,
    Package,
}

/// One item in a step's ordered input list, as consumed by the hashing
/// engine. Mirrors spec.md §3's "every step's input is either (a) the
/// prior step of the same package, (b) a declared dependency result,
/// (c) a declared tool, or (d) the sandbox".
#[derive(Debug, Clone)]
pub enum Input {
    PriorStep { variant_id: VariantId, build_id: Option<BuildId> },
    DependencyArg { variant_id: VariantId, build_id: Option<BuildId> },
    Tool { variant_id: VariantId, build_id: Option<BuildId> },
    Sandbox { variant_id: VariantId, build_id: Option<BuildId> },
    /// A placeholder for a dependency argument whose checkout is
    /// indeterministic and has not executed yet: its identity is not yet
    /// known, so any step depending on it has a dynamic Build-Id
    /// (spec.md §4.3).
    PendingCheckout,
}

impl Input {
    pub fn variant_id(&self) -> &VariantId {
        match self {
            Input::PriorStep { variant_id, .. }
            | Input::DependencyArg { variant_id, .. }
            | Input::Tool { variant_id, .. }
            | Input::Sandbox { variant_id, .. } => variant_id,
            Input::PendingCheckout => {
                unreachable!("pending checkout inputs must be filtered before Variant-Id hashing")
            }
        }
    }

    pub fn build_id(&self) -> Option<&BuildId> {
        match self {
            Input::PriorStep { build_id, .. }
            | Input::DependencyArg { build_id, .. }
            | Input::Tool { build_id, .. }
            | Input::Sandbox { build_id, .. } => build_id.as_ref(),
            Input::PendingCheckout => None,
        }
    }

    pub fn is_pending_checkout(&self) -> bool {
        matches!(self, Input::PendingCheckout)
    }
}

/// A tool's contribution to the hash of a step that consumes it: its own
/// identity plus the path metadata the step's hash must also cover
/// (spec.md §4.3: "VariantId(t) ‖ RelPath(t) ‖ LibPaths(t)").
#[derive(Debug, Clone)]
pub struct ToolContribution {
    pub name: ToolName,
    pub variant_id: VariantId,
    pub build_id: Option<BuildId>,
    pub rel_path: String,
    pub lib_paths: Vec<String>,
}

/// Build the ordered input list for a step, per spec.md §4.3:
/// "(checkout)[dependency args in declared order, then tools in sorted
/// order, then sandbox]. The same ordering applies to build/package except
/// each phase takes the prior step as its first input argument."
pub fn order_inputs(
    role: StepRole,
    prior_step: Option<Input>,
    dependency_args: Vec<Input>,
    tools: &[ToolContribution],
    sandbox: Option<Input>,
) -> Vec<Input> {
    let mut ordered = Vec::new();
    if !matches!(role, StepRole::Checkout) {
        if let Some(prior) = prior_step {
            ordered.push(prior);
        }
    }
    ordered.extend(dependency_args);

    let mut sorted_tools: Vec<&ToolContribution> = tools.iter().collect();
    sorted_tools.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
    for tool in sorted_tools {
        ordered.push(Input::Tool {
            variant_id: tool.variant_id.clone(),
            build_id: tool.build_id.clone(),
        });
    }

    if let Some(sandbox) = sandbox {
        ordered.push(sandbox);
    }
    ordered
}

#[cfg(test)]
mod input_test {
    use super::*;
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};

    fn vid(seed: &str) -> VariantId {
        VariantId::from_digest(CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish())
    }

    #[test]
    fn checkout_has_no_prior_step_slot() {
        let inputs = order_inputs(
            StepRole::Checkout,
            Some(Input::PriorStep { variant_id: vid("prior"), build_id: None }),
            vec![],
            &[],
            None,
        );
        assert!(inputs.is_empty(), "checkout steps must not receive a prior-step input");
    }

    #[test]
    fn build_step_prepends_prior_step() {
        let inputs = order_inputs(
            StepRole::Build,
            Some(Input::PriorStep { variant_id: vid("prior"), build_id: None }),
            vec![Input::DependencyArg { variant_id: vid("dep"), build_id: None }],
            &[],
            None,
        );
        assert_eq!(inputs.len(), 2);
        assert!(matches!(inputs[0], Input::PriorStep { .. }));
        assert!(matches!(inputs[1], Input::DependencyArg { .. }));
    }

    #[test]
    fn sandbox_comes_last() {
        let tools = vec![ToolContribution {
            name: bob_foundation::name::ToolName::new_unchecked("gcc"),
            variant_id: vid("gcc"),
            build_id: None,
            rel_path: "bin/gcc".into(),
            lib_paths: vec![],
        }];
        let inputs = order_inputs(
            StepRole::Package,
            None,
            vec![],
            &tools,
            Some(Input::Sandbox { variant_id: vid("sandbox"), build_id: None }),
        );
        assert!(matches!(inputs.last().unwrap(), Input::Sandbox { .. }));
    }
}
