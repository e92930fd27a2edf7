// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The top-level argument parser and subcommand dispatch table, grounded
//! on the teacher's `spfs_cli_main::cmd_spfs::{Opt, Command}` shape (one
//! `Opt` flattening logging flags plus a `Command` enum dispatched by a
//! single `run` method).

use clap::{Parser, Subcommand};

use crate::commands::{archive, build, clean, graph, jenkins, layers, project, query, status};
use crate::error::Result;
use crate::logging::Logging;

/// The recipe-driven package build system (spec.md §1).
#[derive(Debug, Parser)]
#[clap(about, version)]
pub struct Opt {
    #[clap(flatten)]
    pub logging: Logging,

    #[clap(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build packages in release mode
    Build(build::RunArgs),
    /// Build packages in develop mode
    Dev(build::RunArgs),
    /// Remove unreferenced or attic workspaces
    Clean(clean::CleanArgs),
    /// Inspect or prune the artifact archive
    Archive(archive::ArchiveArgs),
    /// List every package in the instantiated graph
    Ls(query::LsArgs),
    /// List every loaded recipe
    LsRecipes(query::LsArgs),
    /// Evaluate a `bobpaths` query over the instantiated graph
    QueryPath(query::QueryPathArgs),
    /// Print one recipe's merged fields
    QueryRecipe(query::PackageArgs),
    /// Print one recipe's checkout SCM binding
    QueryScm(query::PackageArgs),
    /// Print one recipe's meta-environment
    QueryMeta(query::PackageArgs),
    /// Print one package's full detail
    Show(query::PackageArgs),
    /// Print the instantiated package DAG
    Graph(graph::GraphArgs),
    /// Print resume state for every step
    Status(status::StatusArgs),
    /// Manage Jenkins job specifications (contract-level only)
    Jenkins(jenkins::JenkinsArgs),
    /// Manage the recipe layer stack
    Layers(layers::LayersArgs),
    /// Report a project's on-disk layout
    Project(project::ProjectReportArgs),
    /// Scaffold a new project
    Init(project::InitArgs),
}

impl Opt {
    pub async fn run(&self) -> Result<i32> {
        match &self.cmd {
            Command::Build(args) => build::build(args).await,
            Command::Dev(args) => build::dev(args).await,
            Command::Clean(args) => clean::clean(args),
            Command::Archive(args) => archive::archive(args),
            Command::Ls(args) => query::ls(args),
            Command::LsRecipes(args) => query::ls_recipes(args),
            Command::QueryPath(args) => query::query_path(args),
            Command::QueryRecipe(args) => query::query_recipe(args),
            Command::QueryScm(args) => query::query_scm(args),
            Command::QueryMeta(args) => query::query_meta(args),
            Command::Show(args) => query::show(args),
            Command::Graph(args) => graph::graph(args),
            Command::Status(args) => status::status(args),
            Command::Jenkins(args) => jenkins::jenkins(args),
            Command::Layers(args) => layers::layers(args),
            Command::Project(args) => project::project(args),
            Command::Init(args) => project::init(args),
        }
    }
}

#[cfg(test)]
mod cli_test {
    use clap::Parser;

    use super::Opt;

    #[test]
    fn build_parses_package_list_and_jobs_flag() {
        let opt = Opt::try_parse_from(["bob", "build", "-j", "8", "root::widget"]).unwrap();
        match opt.cmd {
            super::Command::Build(args) => {
                assert_eq!(args.jobs, 8);
                assert_eq!(args.packages, vec!["root::widget".to_string()]);
            }
            other => panic!("expected Build, got {other:?}"),
        }
    }

    #[test]
    fn clean_attic_requires_explicit_force_flag() {
        let opt = Opt::try_parse_from(["bob", "clean", "--attic"]).unwrap();
        match opt.cmd {
            super::Command::Clean(args) => {
                assert!(args.attic);
                assert!(!args.force);
            }
            other => panic!("expected Clean, got {other:?}"),
        }
    }

    #[test]
    fn archive_find_subcommand_parses_its_expression() {
        let opt = Opt::try_parse_from(["bob", "archive", "find", "meta.recipe == \"widget\""]).unwrap();
        match opt.cmd {
            super::Command::Archive(args) => match args.action {
                crate::commands::archive::ArchiveAction::Find { expr } => {
                    assert_eq!(expr, "meta.recipe == \"widget\"");
                }
                other => panic!("expected Find, got {other:?}"),
            },
            other => panic!("expected Archive, got {other:?}"),
        }
    }

    #[test]
    fn verbosity_is_countable() {
        let opt = Opt::try_parse_from(["bob", "-vv", "ls"]).unwrap();
        assert_eq!(opt.logging.verbose, 2);
    }
}
