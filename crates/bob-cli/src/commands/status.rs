// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob status` (spec.md §6): reports each step's resume state against
//! the project's audit trail without running anything.

use bob_scheduler::resume::{resume_state, AuditLayout};
use clap::Args;

use crate::context::ProjectArgs;
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,
}

pub fn status(args: &StatusArgs) -> Result<i32> {
    let (_, graph) = args.project.load_and_instantiate()?;
    let layout = AuditLayout::new(args.project.audit_root());

    for (path, package) in &graph.packages {
        for (label, step) in [
            ("checkout", &package.checkout),
            ("build", &package.build),
            ("package", &package.package),
        ] {
            match &step.build_id {
                Some(build_id) => {
                    let state = resume_state(&layout, build_id);
                    println!("{path}:{label} {state:?}");
                }
                None => println!("{path}:{label} no-build-id"),
            }
        }
    }
    Ok(0)
}
