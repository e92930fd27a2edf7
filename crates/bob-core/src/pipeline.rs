// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The top-level pipeline wiring recipe loading through to a scheduler
//! run (spec.md §4's five components run in sequence for a single `bob
//! build`/`bob dev` invocation).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bob_foundation::EnvMap;
use bob_scheduler::{RunOptions, RunReport, ScmClient, Scheduler, TransientClassifier};
use bob_workspace::{BuildMode, WorkspaceManager};
use tracing::instrument;

use crate::error::{Error, Result};

/// Everything a single pipeline run needs beyond the project itself:
/// the concrete collaborators the core only depends on as trait objects
/// (spec.md §1: SCM capability interface, not concrete protocols).
pub struct PipelineInputs {
    pub project_root: PathBuf,
    pub user_configs: Vec<String>,
    pub defines: Vec<String>,
    pub layer_overrides: Vec<String>,
    pub workspace_root: PathBuf,
    pub audit_root: PathBuf,
    pub build_mode: BuildMode,
    pub scm: Arc<dyn ScmClient>,
    pub scm_classifier: Arc<dyn TransientClassifier>,
    pub cache: Arc<bob_cache::Cache>,
    pub run_options: RunOptions,
    /// Packages to build; empty means every declared root (spec.md §6
    /// `build`/`dev [packages...]`).
    pub targets: Vec<bob_foundation::PackagePath>,
}

/// Runs the full pipeline: load recipes, instantiate the package graph,
/// then drive the scheduler over its roots.
#[instrument(skip_all, fields(project_root = %inputs.project_root.display()))]
pub async fn run(inputs: PipelineInputs) -> Result<RunReport> {
    let load_result = bob_recipe::load(
        &inputs.project_root,
        &inputs.user_configs,
        &inputs.defines,
        &inputs.layer_overrides,
    )?;

    let graph = bob_graph::instantiate(&load_result, &EnvMap::new())?;
    let roots = if inputs.targets.is_empty() { graph.roots.clone() } else { inputs.targets.clone() };

    let workspace = WorkspaceManager::open(&inputs.workspace_root, inputs.build_mode)?;

    let scheduler = Scheduler::new(
        graph,
        inputs.scm,
        inputs.scm_classifier,
        inputs.cache,
        workspace,
        inputs.audit_root,
        load_result.policies.clone(),
        inputs.run_options,
    );

    Ok(scheduler.run(&roots).await?)
}

/// `ls-recipes`/`show`-style read-only access: loads the registry
/// without touching the workspace or scheduler at all.
pub fn load_only(project_root: &Path, user_configs: &[String], defines: &[String]) -> Result<bob_recipe::LoadResult> {
    Ok(bob_recipe::load(project_root, user_configs, defines, &[])?)
}
