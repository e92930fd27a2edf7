// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob build` and `bob dev` (spec.md §6): drive the scheduler over a set
//! of root packages in release or develop mode.

use std::sync::Arc;

use bob_scheduler::{BuildScope, RunOptions, SandboxMode};
use bob_workspace::BuildMode;
use clap::Args;

use crate::cache_args::CacheArgs;
use crate::context::{self, ProjectArgs};
use crate::error::Result;
use crate::shell_scm::ShellScmClient;

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,

    #[clap(flatten)]
    pub cache: CacheArgs,

    /// Packages to build; defaults to every declared root
    pub packages: Vec<String>,

    /// Number of steps to run concurrently
    #[clap(short = 'j', long, default_value_t = 4)]
    pub jobs: usize,

    /// Keep running independent steps after a failure instead of
    /// cancelling the whole run
    #[clap(long)]
    pub keep_going: bool,

    /// Sandbox isolation level for step execution
    #[clap(long, value_enum, default_value = "none")]
    pub sandbox: SandboxArg,

    /// Only run checkout steps
    #[clap(long)]
    pub checkout_only: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SandboxArg {
    None,
    Partial,
    Slim,
    Dev,
    Strict,
}

impl From<SandboxArg> for SandboxMode {
    fn from(mode: SandboxArg) -> Self {
        match mode {
            SandboxArg::None => SandboxMode::None,
            SandboxArg::Partial => SandboxMode::Partial,
            SandboxArg::Slim => SandboxMode::Slim,
            SandboxArg::Dev => SandboxMode::Dev,
            SandboxArg::Strict => SandboxMode::Strict,
        }
    }
}

async fn run(args: &RunArgs, mode: BuildMode) -> Result<i32> {
    let root_paths = args.packages.iter().map(|r| context::parse_path(r)).collect::<Result<Vec<_>>>()?;

    let run_options = RunOptions {
        jobs: args.jobs,
        keep_going: args.keep_going,
        scope: if args.checkout_only { BuildScope::CheckoutOnly } else { BuildScope::Full },
        sandbox_mode: args.sandbox.into(),
    };

    let inputs = bob_core::PipelineInputs {
        project_root: args.project.project_root.clone(),
        user_configs: args.project.user_configs.clone(),
        defines: args.project.defines.clone(),
        layer_overrides: Vec::new(),
        workspace_root: args.project.workspace_root(),
        audit_root: args.project.audit_root(),
        build_mode: mode,
        scm: Arc::new(ShellScmClient),
        scm_classifier: Arc::new(bob_scheduler::IoTransient),
        cache: Arc::new(args.cache.build()),
        run_options,
        targets: root_paths,
    };

    let report = bob_core::run(inputs).await.map_err(crate::error::Error::from)?;

    for step in &report.steps {
        println!("{} {:?}", step.step, step.state);
    }

    Ok(if report.failed { 1 } else { 0 })
}

pub async fn build(args: &RunArgs) -> Result<i32> {
    run(args, BuildMode::Release).await
}

pub async fn dev(args: &RunArgs) -> Result<i32> {
    run(args, BuildMode::Dev).await
}
