// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `ls`, `ls-recipes`, `query-path`, `query-recipe`, `query-scm`,
//! `query-meta`, `show` (spec.md §6, §4.8 path query engine).

use bob_query::bobpaths::PathNode;
use bob_query::{EmptyResultPolicy, PathExpr};
use clap::Args;

use crate::context::{self, require_nonempty, ProjectArgs};
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct FailArgs {
    /// Treat an empty result as an error (spec.md §6 `--fail`)
    #[clap(long)]
    pub fail: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LsArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,
    #[clap(flatten)]
    pub fail: FailArgs,
}

pub fn ls(args: &LsArgs) -> Result<i32> {
    let (_, graph) = args.project.load_and_instantiate()?;
    let paths: Vec<String> = graph.packages.keys().cloned().collect();
    let paths = require_nonempty(paths, args.fail.fail)?;
    for path in &paths {
        println!("{path}");
    }
    Ok(0)
}

pub fn ls_recipes(args: &LsArgs) -> Result<i32> {
    let load_result = args.project.load()?;
    let mut names: Vec<String> = load_result.recipes.keys().cloned().collect();
    names.sort();
    let names = require_nonempty(names, args.fail.fail)?;
    for name in &names {
        let recipe = &load_result.recipes[name];
        let marker = if recipe.is_root { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(0)
}

#[derive(Debug, Clone, Args)]
pub struct QueryPathArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,
    #[clap(flatten)]
    pub fail: FailArgs,
    /// A `bobpaths` expression (spec.md §4.8)
    pub expr: String,
}

/// Adapts the instantiated [`bob_graph::PackageGraph`] into the tree shape
/// [`PathExpr::evaluate`] walks, following each package's declared
/// dependencies as its children.
struct GraphNode<'g> {
    name: String,
    children: Vec<GraphNode<'g>>,
    #[allow(dead_code)]
    graph: &'g bob_graph::PackageGraph,
}

impl<'g> GraphNode<'g> {
    fn build(path: &bob_foundation::PackagePath, graph: &'g bob_graph::PackageGraph) -> Self {
        let children = graph
            .get(path)
            .map(|pkg| pkg.dependencies.iter().map(|dep| GraphNode::build(&dep.package, graph)).collect())
            .unwrap_or_default();
        Self { name: path.leaf().as_str().to_string(), children, graph }
    }
}

impl<'g> PathNode for GraphNode<'g> {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Vec<&Self> {
        self.children.iter().collect()
    }
}

pub fn query_path(args: &QueryPathArgs) -> Result<i32> {
    let (_, graph) = args.project.load_and_instantiate()?;
    let policy = if args.fail.fail { EmptyResultPolicy::NullFail } else { EmptyResultPolicy::NullSet };
    let expr = PathExpr::parse(&args.expr)?.with_empty_result_policy(policy);

    let roots: Vec<GraphNode> = graph.roots.iter().map(|p| GraphNode::build(p, &graph)).collect();
    let root_refs: Vec<&GraphNode> = roots.iter().collect();

    let matched = expr.evaluate(&root_refs, |_node, _predicate| Ok(true))?;
    for node in matched {
        println!("{}", node.name());
    }
    Ok(0)
}

#[derive(Debug, Clone, Args)]
pub struct PackageArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,
    /// A `package::path` in the instantiated graph
    pub path: String,
}

pub fn query_recipe(args: &PackageArgs) -> Result<i32> {
    let load_result = args.project.load()?;
    let recipe = load_result
        .recipes
        .get(&args.path)
        .ok_or_else(|| crate::error::Error::UnknownRecipe(args.path.clone()))?;
    println!("{:#?}", recipe.merged);
    Ok(0)
}

pub fn query_scm(args: &PackageArgs) -> Result<i32> {
    let load_result = args.project.load()?;
    let recipe = load_result
        .recipes
        .get(&args.path)
        .ok_or_else(|| crate::error::Error::UnknownRecipe(args.path.clone()))?;
    match &recipe.merged.checkout_scm {
        Some(scm) => println!("{scm:#?}"),
        None => println!("{} has no checkoutSCM", args.path),
    }
    Ok(0)
}

pub fn query_meta(args: &PackageArgs) -> Result<i32> {
    let load_result = args.project.load()?;
    let recipe = load_result
        .recipes
        .get(&args.path)
        .ok_or_else(|| crate::error::Error::UnknownRecipe(args.path.clone()))?;
    for (key, value) in &recipe.merged.meta_environment {
        println!("{key}={value}");
    }
    Ok(0)
}

pub fn show(args: &PackageArgs) -> Result<i32> {
    let (_, graph) = args.project.load_and_instantiate()?;
    let package = context::resolve(&graph, &args.path)?;
    println!("path:        {}", package.path);
    println!("relocatable: {}", package.relocatable);
    println!("shared:      {}", package.shared);
    println!("dependencies:");
    for dep in &package.dependencies {
        println!("  {} -> {} (alias {})", package.path, dep.package, dep.alias);
    }
    for (label, step) in [("checkout", &package.checkout), ("build", &package.build), ("package", &package.package)] {
        println!("{label}:");
        if let Some(variant_id) = &step.variant_id {
            println!("  variant-id: {variant_id}");
        }
        if let Some(build_id) = &step.build_id {
            println!("  build-id:   {build_id}");
        }
        println!("  script:\n{}", indent(&step.script));
    }
    Ok(0)
}

fn indent(script: &str) -> String {
    script.lines().map(|line| format!("    {line}")).collect::<Vec<_>>().join("\n")
}
