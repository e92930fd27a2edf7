// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob project` and `bob init` (spec.md §6 "File layout of a project"):
//! report a project's on-disk layout, or scaffold a new one.

use std::path::Path;

use clap::Args;

use crate::context::ProjectArgs;
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct ProjectReportArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,
}

const LAYOUT_DIRS: &[&str] = &["recipes", "classes", "aliases", "plugins", "layers"];

pub fn project(args: &ProjectReportArgs) -> Result<i32> {
    let root = &args.project.project_root;
    println!("project root: {}", root.display());
    for dir in LAYOUT_DIRS {
        let path = root.join(dir);
        let marker = if path.is_dir() { "present" } else { "absent" };
        println!("  {dir:<8} {marker}");
    }
    for file in ["config.yaml", "default.yaml"] {
        let path = root.join(file);
        println!("  {file:<8} {}", if path.is_file() { "present" } else { "absent" });
    }
    let load_result = args.project.load()?;
    println!("recipes loaded: {}", load_result.recipes.len());
    println!("roots: {}", load_result.roots.join(", "));
    Ok(0)
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Directory to scaffold; must not already contain a project
    #[clap(default_value = ".")]
    pub path: std::path::PathBuf,
}

const DEFAULT_YAML: &str = "# Created by `bob init`.\npolicies: {}\n";
const CONFIG_YAML: &str = "# Created by `bob init`. Add `-c`-style overrides here.\n";

fn scaffold_dir(root: &Path, name: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join(name))
}

pub fn init(args: &InitArgs) -> Result<i32> {
    let root = &args.path;
    if root.join("config.yaml").exists() {
        println!("{} already looks like a bob project, leaving it alone", root.display());
        return Ok(1);
    }

    std::fs::create_dir_all(root)?;
    for dir in ["recipes", "classes", "aliases"] {
        scaffold_dir(root, dir)?;
    }
    std::fs::write(root.join("config.yaml"), CONFIG_YAML)?;
    std::fs::write(root.join("default.yaml"), DEFAULT_YAML)?;

    println!("initialized a bob project at {}", root.display());
    Ok(0)
}
