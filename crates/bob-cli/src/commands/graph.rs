// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob graph` (spec.md §6): prints the instantiated package DAG as an
//! adjacency list.

use clap::Args;

use crate::context::ProjectArgs;
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct GraphArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,
}

pub fn graph(args: &GraphArgs) -> Result<i32> {
    let (_, graph) = args.project.load_and_instantiate()?;
    println!("roots: {}", graph.roots.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
    for (path, package) in &graph.packages {
        if package.dependencies.is_empty() {
            println!("{path}");
            continue;
        }
        for dep in &package.dependencies {
            println!("{path} -> {} [{}]", dep.package, dep.alias);
        }
    }
    Ok(0)
}
