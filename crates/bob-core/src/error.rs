// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The aggregated, CLI-facing error surface (spec.md §7). Every
//! subsystem crate keeps its own `thiserror::Error`; this type only
//! wraps them with `#[from]` plus `miette::Diagnostic` so the CLI can
//! render source file, recipe path and step context uniformly.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    Recipe(#[from] bob_recipe::Error),

    #[error(transparent)]
    Graph(#[from] bob_graph::Error),

    #[error(transparent)]
    Workspace(#[from] bob_workspace::Error),

    #[error(transparent)]
    Scheduler(#[from] bob_scheduler::Error),

    #[error(transparent)]
    Cache(#[from] bob_cache::Error),

    #[error(transparent)]
    Audit(#[from] bob_audit::Error),

    #[error(transparent)]
    Query(#[from] bob_query::QueryExprError),

    #[error("{0}")]
    Jenkins(String),

    /// Several independent errors surfaced together, e.g. a `ls-recipes`
    /// pass that keeps walking after a malformed recipe file (spec.md §4.1
    /// "aggregate independent errors where feasible") bubbled up past the
    /// loader into a top-level report.
    #[error("{} errors:\n{}", .0.len(), render_many(.0))]
    Many(Vec<Error>),
}

fn render_many(errors: &[Error]) -> String {
    errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n")
}

impl Error {
    pub fn aggregate(errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.into_iter().next(),
            _ => Some(Error::Many(errors)),
        }
    }
}
