// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob layers {update,status,ls}` (spec.md §6, §4.4 layer loading):
//! inspects the layer stack the loader just built. `update` re-runs the
//! loader with `--layer` overrides and reports the result; fetching a
//! managed layer's SCM revision is `bob-workspace`'s job, not the
//! loader's or this command's (see `bob_recipe::loader::load`'s doc
//! comment).

use clap::{Args, Subcommand};

use crate::context::ProjectArgs;
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct LayersArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,

    #[clap(subcommand)]
    pub action: LayersAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum LayersAction {
    /// Re-resolve the layer stack, optionally pinning managed layers
    Update {
        /// `name=revision` overrides, same shape as `bob build --layer`
        #[clap(long = "layer")]
        overrides: Vec<String>,
    },
    /// Print each layer's managed/unmanaged status and resolved root
    Status,
    /// List layer names in precedence order (last wins)
    Ls,
}

pub fn layers(args: &LayersArgs) -> Result<i32> {
    match &args.action {
        LayersAction::Update { overrides } => {
            let load_result = bob_recipe::load(&args.project.project_root, &args.project.user_configs, &args.project.defines, overrides)
                .map_err(bob_core::Error::from)?;
            for layer in load_result.layers.layers() {
                let state = match &layer.root {
                    Some(root) => format!("resolved at {}", root.display()),
                    None => "unresolved".to_string(),
                };
                println!("{} ({}): {state}", layer.name, if layer.managed { "managed" } else { "unmanaged" });
            }
            Ok(0)
        }
        LayersAction::Status => {
            let load_result = args.project.load()?;
            for layer in load_result.layers.layers() {
                println!("name:    {}", layer.name);
                println!("managed: {}", layer.managed);
                if let Some(kind) = &layer.scm_kind {
                    println!("scm:     {kind} {}", layer.scm_url.as_deref().unwrap_or(""));
                }
                match &layer.root {
                    Some(root) => println!("root:    {}", root.display()),
                    None => println!("root:    <unresolved>"),
                }
                println!();
            }
            Ok(0)
        }
        LayersAction::Ls => {
            let load_result = args.project.load()?;
            for layer in load_result.layers.layers() {
                println!("{}", layer.name);
            }
            Ok(0)
        }
    }
}
