// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Package/Step/Tool/Sandbox: the graph instantiator's output types
//! (spec.md §3 Package, Step, Tool, Sandbox). Immutable once produced —
//! "Packages/steps: created during graph instantiation, read-only after".

use std::collections::BTreeMap;

use bob_foundation::{EnvMap, PackagePath, ToolName};
use bob_ident::{BuildId, VariantId};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum StepRole {
    Checkout,
    Build,
    Package,
}

impl From<StepRole> for bob_ident::StepRole {
    fn from(role: StepRole) -> Self {
        match role {
            StepRole::Checkout => bob_ident::StepRole::Checkout,
            StepRole::Build => bob_ident::StepRole::Build,
            StepRole::Package => bob_ident::StepRole::Package,
        }
    }
}

/// An exported capability from a providing package (spec.md §3 Tool).
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: ToolName,
    pub provider: PackagePath,
    pub rel_path: String,
    pub lib_paths: Vec<String>,
    pub private_environment: EnvMap,
    pub depends_strong: Vec<ToolName>,
    pub depends_weak: Vec<ToolName>,
    pub variant_id: VariantId,
    pub build_id: Option<BuildId>,
}

#[derive(Debug, Clone)]
pub struct MountSpec {
    pub host: String,
    pub target: String,
    pub writable: bool,
}

/// A capability exported by a package providing an ephemeral root
/// filesystem for step execution (spec.md §3 Sandbox).
#[derive(Debug, Clone)]
pub struct Sandbox {
    pub provider: PackagePath,
    pub initial_path: Vec<String>,
    pub mounts: Vec<MountSpec>,
    pub variant_id: VariantId,
    pub build_id: Option<BuildId>,
}

/// One of {checkout, build, package} within a [`Package`] (spec.md §3
/// Step). `Variant-Id`/`Build-Id`/`Artifact-Id` are computed by
/// `bob-ident` once this step's fields are finalized; they are cached
/// here as `Option` until that happens so construction and hashing stay
/// separate passes.
#[derive(Debug, Clone)]
pub struct Step {
    pub role: StepRole,
    pub script: String,
    /// Ordered argument list: the resolved workspace/result paths of
    /// dependencies this step consumes, in declared order.
    pub args: Vec<PackagePath>,
    pub tools: Vec<Tool>,
    pub env: EnvMap,
    pub sandbox: Option<Sandbox>,
    pub variant_id: Option<VariantId>,
    pub build_id: Option<BuildId>,
    pub artifact_id: Option<bob_ident::ArtifactId>,
}

impl Step {
    pub fn new(role: StepRole, script: String) -> Self {
        Self {
            role,
            script,
            args: Vec::new(),
            tools: Vec::new(),
            env: EnvMap::new(),
            sandbox: None,
            variant_id: None,
            build_id: None,
            artifact_id: None,
        }
    }
}

/// One resolved, active dependency of a [`Package`] (spec.md §4.2 step
/// 4): which recipe it instantiated to, under what alias, and which
/// outputs were merged back.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    pub alias: String,
    pub package: PackagePath,
    pub use_deps: bool,
    pub use_environment: bool,
    pub use_tools: bool,
    pub use_sandbox: bool,
    pub use_result: bool,
}

/// An instantiation of a recipe in a specific context (spec.md §3
/// Package). A package's identity is fully determined by its inputs —
/// `Package-Id` is the `Variant-Id` of its package step.
#[derive(Debug, Clone)]
pub struct Package {
    pub path: PackagePath,
    pub env: EnvMap,
    pub tools: Vec<Tool>,
    pub sandbox: Option<Sandbox>,
    pub dependencies: Vec<ResolvedDependency>,
    pub checkout: Step,
    pub build: Step,
    pub package: Step,
    pub relocatable: bool,
    pub shared: bool,
    pub fingerprint_script: Option<String>,
    pub fingerprint_vars: Vec<String>,
    /// This recipe's own `provideVars`, evaluated against its context —
    /// the only variables a consumer with `useEnvironment: true` merges
    /// back (spec.md §3).
    pub provided_vars: BTreeMap<String, String>,
}

impl Package {
    pub fn package_id(&self) -> Option<bob_ident::PackageId> {
        self.package.variant_id.clone().map(bob_ident::PackageId::from)
    }
}

/// The full DAG produced by [`crate::instantiate::instantiate`], keyed by
/// package path (spec.md §4.2: `instantiate(...) -> PackageGraph`).
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    pub packages: std::collections::BTreeMap<String, Package>,
    pub roots: Vec<PackagePath>,
}

impl PackageGraph {
    pub fn get(&self, path: &PackagePath) -> Option<&Package> {
        self.packages.get(&path.to_string())
    }
}
