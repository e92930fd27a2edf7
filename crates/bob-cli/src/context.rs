// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing every subcommand needs: loading the recipe registry,
//! instantiating the package graph, and resolving a `package::path`
//! argument against it.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use bob_foundation::{EnvMap, PackagePath};
use bob_graph::PackageGraph;
use bob_recipe::LoadResult;

use crate::error::{Error, Result};

/// Flags every subcommand that touches a project shares (spec.md §6
/// "File layout of a project").
#[derive(Debug, Clone, clap::Args)]
pub struct ProjectArgs {
    /// Project root (defaults to the current directory)
    #[clap(long, global = true, default_value = ".")]
    pub project_root: PathBuf,

    /// Additional `-c` config overrides, applied in order
    #[clap(short = 'c', long = "config", global = true)]
    pub user_configs: Vec<String>,

    /// `-D NAME=VALUE` defines passed to the loader
    #[clap(short = 'D', long = "define", global = true)]
    pub defines: Vec<String>,
}

impl ProjectArgs {
    pub fn load(&self) -> Result<LoadResult> {
        bob_recipe::load(&self.project_root, &self.user_configs, &self.defines, &[])
            .map_err(bob_core::Error::from)
            .map_err(Error::from)
    }

    pub fn load_and_instantiate(&self) -> Result<(LoadResult, PackageGraph)> {
        let load_result = self.load()?;
        let graph = bob_graph::instantiate(&load_result, &EnvMap::new())
            .map_err(bob_core::Error::from)?;
        Ok((load_result, graph))
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.project_root.join("work")
    }

    pub fn audit_root(&self) -> PathBuf {
        self.project_root.join("work").join(".audit")
    }
}

pub fn parse_path(raw: &str) -> Result<PackagePath> {
    PackagePath::from_str(raw).map_err(|_| Error::InvalidPath(raw.to_string()))
}

pub fn resolve<'g>(graph: &'g PackageGraph, raw: &str) -> Result<&'g bob_graph::Package> {
    let path = parse_path(raw)?;
    graph.get(&path).ok_or_else(|| Error::UnknownPackage(raw.to_string()))
}

/// `--fail` support shared by every query-shaped subcommand (spec.md §6:
/// "`--fail` toggles errors for empty query results").
pub fn require_nonempty<T>(items: Vec<T>, fail_on_empty: bool) -> Result<Vec<T>> {
    if items.is_empty() && fail_on_empty {
        return Err(Error::EmptyQuery);
    }
    Ok(items)
}

pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}
