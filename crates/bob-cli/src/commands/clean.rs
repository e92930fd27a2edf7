// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob clean` (spec.md §6 garbage collection, §8 "Attic discipline").

use bob_graph::StepRole;
use bob_workspace::{BuildMode, WorkspaceArea, WorkspaceManager};
use clap::Args;

use crate::context::ProjectArgs;
use crate::error::Result;

fn workspace_area(role: StepRole) -> WorkspaceArea {
    match role {
        StepRole::Checkout => WorkspaceArea::Src,
        StepRole::Build => WorkspaceArea::Build,
        StepRole::Package => WorkspaceArea::Dist,
    }
}

#[derive(Debug, Clone, Args)]
pub struct CleanArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,

    /// Remove retired attic workspaces instead of live, unreferenced ones
    #[clap(long)]
    pub attic: bool,

    /// Actually confirm the deletion (scenario: "`bob clean --attic`
    /// without `-f` refuses to delete the attic; with `-f` deletes it")
    #[clap(short = 'f', long)]
    pub force: bool,

    /// Build mode whose workspace tree to clean
    #[clap(long, value_enum, default_value = "release")]
    pub mode: CleanMode,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CleanMode {
    Dev,
    Release,
}

impl From<CleanMode> for BuildMode {
    fn from(mode: CleanMode) -> Self {
        match mode {
            CleanMode::Dev => BuildMode::Dev,
            CleanMode::Release => BuildMode::Release,
        }
    }
}

pub fn clean(args: &CleanArgs) -> Result<i32> {
    let manager = WorkspaceManager::open(args.project.workspace_root(), args.mode.into())
        .map_err(bob_core::Error::from)?;

    if args.attic {
        let entries = manager.list_attics();
        if entries.is_empty() {
            println!("attic is empty");
            return Ok(0);
        }
        if !args.force {
            println!("would remove {} attic director{}:", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
            for entry in &entries {
                println!("  {}", entry.display());
            }
            println!("refusing without --force/-f");
            return Ok(1);
        }
        let mut manager = manager;
        for entry in entries {
            println!("removing {}", entry.display());
            manager.remove(&entry, true).map_err(bob_core::Error::from)?;
        }
        return Ok(0);
    }

    let (_, graph) = args.project.load_and_instantiate()?;
    let bob_mode: BuildMode = args.mode.into();
    let mut live = std::collections::BTreeSet::new();
    for package in graph.packages.values() {
        for (role, step) in [
            (StepRole::Checkout, &package.checkout),
            (StepRole::Build, &package.build),
            (StepRole::Package, &package.package),
        ] {
            if let Some(variant_id) = &step.variant_id {
                let bucket = bob_workspace::layout::bucket_key(&bob_mode, &package.path, workspace_area(role));
                live.insert((bucket, variant_id.to_hex()));
            }
        }
    }
    let unreferenced = manager.list_unreferenced(&live);
    if unreferenced.is_empty() {
        println!("no unreferenced workspaces");
        return Ok(0);
    }
    let mut manager = manager;
    for path in unreferenced {
        println!("removing {}", path.display());
        manager.remove(&path, args.force).map_err(bob_core::Error::from)?;
    }
    Ok(0)
}
