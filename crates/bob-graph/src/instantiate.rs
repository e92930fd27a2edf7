// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The graph instantiation algorithm (spec.md §4.2): walks declared roots,
//! propagating environment/tools/sandbox context, and emits the
//! [`PackageGraph`].

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use bob_foundation::{EnvMap, PackagePath, RecipeName, ToolName};
use bob_ident::{Input, ToolContribution};
use bob_recipe::{LoadResult, PolicyName, PolicySet};
use tracing::instrument;

use crate::context::{eval_if, substitute, Context};
use crate::error::{Error, Result};
use crate::types::{
    MountSpec, Package, PackageGraph, ResolvedDependency, Sandbox, Step, StepRole, Tool,
};

/// `instantiate(registry, initialEnv) -> PackageGraph` (spec.md §4.2).
#[instrument(skip_all)]
pub fn instantiate(registry: &LoadResult, initial_env: &EnvMap) -> Result<PackageGraph> {
    let defines = BTreeMap::new();
    let clean_environment = registry.policies.is_new(PolicyName::CleanEnvironment);
    let mut graph = PackageGraph::default();

    let mut roots = Vec::new();
    for recipe_key in &registry.roots {
        let root_name = RecipeName::from_str(leaf_segment(recipe_key))?;
        let path = PackagePath::root(root_name);
        let ctx = Context::root(initial_env, clean_environment);
        let mut stack = Vec::new();
        instantiate_recipe(&path, recipe_key, ctx, registry, &defines, &mut stack, &mut graph)?;
        roots.push(path);
    }
    graph.roots = roots;
    Ok(graph)
}

fn leaf_segment(recipe_key: &str) -> &str {
    recipe_key.rsplit("::").next().unwrap_or(recipe_key)
}

/// Recursively instantiate `recipe_key` at `path` within `ctx`, recording
/// the resulting [`Package`] into `graph`. `stack` tracks the chain of
/// recipe keys currently being instantiated, for cycle detection (spec.md
/// §4.2 step 9: "aliases do not break cycles").
fn instantiate_recipe(
    path: &PackagePath,
    recipe_key: &str,
    mut ctx: Context,
    registry: &LoadResult,
    defines: &BTreeMap<String, String>,
    stack: &mut Vec<String>,
    graph: &mut PackageGraph,
) -> Result<()> {
    if stack.iter().any(|k| k == recipe_key) {
        let mut cycle = stack.clone();
        cycle.push(recipe_key.to_string());
        return Err(Error::CycleError(cycle.join(" -> ")));
    }
    let loaded = registry
        .get(recipe_key)
        .ok_or_else(|| Error::UnresolvedDependency {
            package: path.clone(),
            dependency: recipe_key.to_string(),
        })?;
    let merged = &loaded.merged;
    let policies = &registry.policies;

    // Step 2: apply this recipe's own environment/privateEnvironment,
    // each value substituted against the context inherited so far.
    for (key, value) in &merged.environment {
        let evaluated = substitute(value, &ctx.env, defines)?;
        ctx.env.set(key.clone(), evaluated);
    }
    for (key, value) in &merged.private_environment {
        let evaluated = substitute(value, &ctx.env, defines)?;
        ctx.env.set(key.clone(), evaluated);
    }

    // This recipe's `provideVars` declarations, evaluated against its own
    // context same as `environment`/`privateEnvironment`. These are the
    // only variables a consumer merges back (spec.md §3: "environment
    // (merge provideVars)") — `privateEnvironment` stays private by
    // definition, and `environment` not also re-declared under
    // `provideVars` does not propagate.
    let mut provided_vars = BTreeMap::new();
    for (key, value) in &merged.provide_vars {
        let evaluated = substitute(value, &ctx.env, defines)?;
        ctx.env.set(key.clone(), evaluated.clone());
        provided_vars.insert(key.clone(), evaluated);
    }

    // Step 3: snapshot the context to forward to the first dependency.
    ctx.forwarded_env = ctx.env.clone();
    ctx.forwarded_tools = ctx.tools.clone();
    ctx.forwarded_sandbox = ctx.sandbox.clone();

    stack.push(recipe_key.to_string());

    let mut resolved_deps = Vec::new();
    let mut build_args = Vec::new();
    resolve_dependencies(
        path,
        &merged.depends,
        &mut ctx,
        registry,
        defines,
        stack,
        graph,
        &mut resolved_deps,
        &mut build_args,
    )?;
    let mut package_args = Vec::new();
    resolve_dependencies(
        path,
        &merged.package_depends,
        &mut ctx,
        registry,
        defines,
        stack,
        graph,
        &mut resolved_deps,
        &mut package_args,
    )?;

    stack.pop();

    if policies.is_new(PolicyName::UniqueDependency) {
        let mut seen = BTreeSet::new();
        for dep in &resolved_deps {
            if !seen.insert(dep.alias.clone()) {
                return Err(Error::VariantConflict {
                    package: path.clone(),
                    name: dep.alias.clone(),
                });
            }
        }
    }

    // Step 6: sliding-pipeline var/tool sets, cumulative across phases.
    let checkout_vars: BTreeSet<String> = merged.checkout_vars.iter().cloned().collect();
    let mut build_vars = checkout_vars.clone();
    build_vars.extend(merged.build_vars.iter().cloned());
    let mut package_vars = build_vars.clone();
    package_vars.extend(merged.package_vars.iter().cloned());

    let checkout_tool_names: BTreeSet<String> = merged.checkout_tools.iter().cloned().collect();
    let mut build_tool_names = checkout_tool_names.clone();
    build_tool_names.extend(merged.build_tools.iter().cloned());
    let mut package_tool_names = build_tool_names.clone();
    package_tool_names.extend(merged.package_tools.iter().cloned());

    let no_undefined_tools = policies.is_new(PolicyName::NoUndefinedTools);
    let checkout_tools = select_tools(&ctx.tools, &checkout_tool_names, path, no_undefined_tools)?;
    let build_tools = select_tools(&ctx.tools, &build_tool_names, path, no_undefined_tools)?;
    let package_tools = select_tools(&ctx.tools, &package_tool_names, path, no_undefined_tools)?;

    let mut checkout = Step::new(StepRole::Checkout, merged.checkout_script.clone());
    checkout.tools = checkout_tools;
    checkout.env = ctx.env.subset(checkout_vars.iter());
    checkout.sandbox = ctx.sandbox.clone();

    let mut build = Step::new(StepRole::Build, merged.build_script.clone());
    build.tools = build_tools;
    build.env = ctx.env.subset(build_vars.iter());
    build.sandbox = ctx.sandbox.clone();
    build.args = build_args;

    let mut package = Step::new(StepRole::Package, merged.package_script.clone());
    package.tools = package_tools;
    package.env = ctx.env.subset(package_vars.iter());
    package.sandbox = ctx.sandbox.clone();
    package.args = package_args;

    // Identity & Hashing Engine integration (spec.md §4.3): each step's
    // Variant-Id/Build-Id is computed in pipeline order, since build and
    // package steps take their prior step as their first ordered input.
    let algorithm = bob_foundation::digest::HashAlgorithm::CURRENT;

    let checkout_inputs = step_inputs(StepRole::Checkout, None, &[], &checkout.tools, checkout.sandbox.as_ref());
    checkout.variant_id = Some(bob_ident::compute_variant_id(
        algorithm,
        &checkout.script,
        &tool_contributions(&checkout.tools),
        &checkout.env,
        &checkout_inputs,
    ));
    checkout.build_id = bob_ident::compute_static_build_id(
        algorithm,
        &checkout.script,
        &tool_contributions(&checkout.tools),
        &checkout.env,
        &checkout_inputs,
        None,
    );
    checkout.artifact_id = checkout.build_id.as_ref().map(bob_ident::ArtifactId::from);

    let build_arg_packages = lookup_args(graph, &build.args);
    let build_inputs = step_inputs(
        StepRole::Build,
        Some(&checkout),
        &build_arg_packages,
        &build.tools,
        build.sandbox.as_ref(),
    );
    build.variant_id = Some(bob_ident::compute_variant_id(
        algorithm,
        &build.script,
        &tool_contributions(&build.tools),
        &build.env,
        &build_inputs,
    ));
    build.build_id = bob_ident::compute_static_build_id(
        algorithm,
        &build.script,
        &tool_contributions(&build.tools),
        &build.env,
        &build_inputs,
        None,
    );
    build.artifact_id = build.build_id.as_ref().map(bob_ident::ArtifactId::from);

    // Fingerprint (spec.md §4.3 "Fingerprint integration"): hash of the
    // fingerprint script's declared vars, concatenated into the package
    // step's Build-Id input after its env block.
    let fingerprint = merged.fingerprint_script.as_ref().map(|script| {
        let mut hasher = bob_foundation::digest::CanonicalHasher::new(algorithm);
        hasher.update(script.as_bytes());
        let fingerprint_env = package.env.subset(merged.fingerprint_vars.iter());
        for (key, value) in fingerprint_env.iter() {
            hasher.update(key.as_bytes()).update(value.as_hash_field());
        }
        if !merged.relocatable {
            hasher.update(path.to_string().as_bytes());
        }
        bob_ident::BuildId::new_static(hasher.finish())
    });

    let package_arg_packages = lookup_args(graph, &package.args);
    let package_inputs = step_inputs(
        StepRole::Package,
        Some(&build),
        &package_arg_packages,
        &package.tools,
        package.sandbox.as_ref(),
    );
    package.variant_id = Some(bob_ident::compute_variant_id(
        algorithm,
        &package.script,
        &tool_contributions(&package.tools),
        &package.env,
        &package_inputs,
    ));
    package.build_id = bob_ident::compute_static_build_id(
        algorithm,
        &package.script,
        &tool_contributions(&package.tools),
        &package.env,
        &package_inputs,
        fingerprint.as_ref(),
    );
    package.artifact_id = package.build_id.as_ref().map(bob_ident::ArtifactId::from);

    // Step 7: this package's own exported capabilities take on its
    // package step's identity — a tool or sandbox only exists once the
    // package step that produces it has run.
    let package_variant_id = package
        .variant_id
        .clone()
        .expect("package step Variant-Id is always computable: it has no pending-checkout inputs");

    let own_sandbox = merged.provide_sandbox.as_ref().map(|spec| Sandbox {
        provider: path.clone(),
        initial_path: Vec::new(),
        mounts: spec
            .mounts
            .iter()
            .map(|m| MountSpec {
                host: m.host.clone(),
                target: m.target.clone(),
                writable: m.writable,
            })
            .collect(),
        variant_id: package_variant_id.clone(),
        build_id: package.build_id.clone(),
    });

    let own_tools: Vec<Tool> = merged
        .provide_tools
        .iter()
        .map(|(name, rel_path)| Tool {
            name: ToolName::new_unchecked(name.clone()),
            provider: path.clone(),
            rel_path: rel_path.clone(),
            lib_paths: Vec::new(),
            private_environment: EnvMap::new(),
            depends_strong: Vec::new(),
            depends_weak: Vec::new(),
            variant_id: package_variant_id.clone(),
            build_id: package.build_id.clone(),
        })
        .collect();

    let package_struct = Package {
        path: path.clone(),
        env: ctx.env.clone(),
        tools: own_tools,
        sandbox: own_sandbox,
        dependencies: resolved_deps,
        checkout,
        build,
        package,
        relocatable: merged.relocatable,
        shared: merged.shared,
        fingerprint_script: merged.fingerprint_script.clone(),
        fingerprint_vars: merged.fingerprint_vars.clone(),
        provided_vars,
    };

    graph.packages.insert(path.to_string(), package_struct);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_dependencies(
    path: &PackagePath,
    deps: &[bob_recipe::yaml::DependencySpec],
    ctx: &mut Context,
    registry: &LoadResult,
    defines: &BTreeMap<String, String>,
    stack: &mut Vec<String>,
    graph: &mut PackageGraph,
    resolved_out: &mut Vec<ResolvedDependency>,
    args_out: &mut Vec<PackagePath>,
) -> Result<()> {
    for dep in deps {
        // `if` predicate guards activation; substitution errors in a
        // disabled dependency's own name are suppressed (spec.md §4.2
        // step 4), so the predicate is evaluated first and unconditionally.
        if !eval_if(dep.if_cond.as_deref(), &ctx.env, defines)? {
            continue;
        }

        let mut dep_ctx = ctx.for_dependency();
        for (key, value) in &dep.environment {
            let evaluated = substitute(value, &dep_ctx.env, defines)?;
            dep_ctx.env.set(key.clone(), evaluated);
        }

        let resolved_name = substitute(&dep.name, &dep_ctx.env, defines)?;
        let target_key = resolve_alias(&resolved_name, registry);
        let alias = dep.alias.clone().unwrap_or_else(|| resolved_name.clone());
        let segment = RecipeName::from_str(alias.rsplit("::").next().unwrap_or(&alias))?;
        let child_path = path.join(segment);

        instantiate_recipe(&child_path, &target_key, dep_ctx, registry, defines, stack, graph)?;

        let child = graph
            .get(&child_path)
            .expect("instantiate_recipe always inserts its own package on success")
            .clone();

        let use_deps = dep.use_deps.unwrap_or(true);
        let use_environment = dep.use_environment.unwrap_or(true);
        let use_tools = dep.use_tools.unwrap_or(true);
        let use_sandbox = dep.use_sandbox.unwrap_or(true);
        let use_result = dep.use_result.unwrap_or(true);

        if use_environment {
            // Merge back only the child's declared `provideVars`
            // (spec.md §3) — its `privateEnvironment` and any plain
            // `environment` it never re-declared under `provideVars`
            // stay local to the child.
            let mut provided = EnvMap::new();
            for (key, value) in &child.provided_vars {
                provided.set(key.clone(), value.clone());
            }
            ctx.env.merge_overriding(&provided);
        }
        if use_tools {
            for tool in &child.tools {
                if !ctx.tools.iter().any(|t| t.name == tool.name) {
                    ctx.tools.push(tool.clone());
                }
            }
        }
        if use_sandbox {
            if let Some(sandbox) = &child.sandbox {
                ctx.sandbox = Some(sandbox.clone());
            }
        }
        if use_deps {
            for grandchild in &child.dependencies {
                if !resolved_out.iter().any(|d| d.alias == grandchild.alias) {
                    resolved_out.push(grandchild.clone());
                }
            }
        }
        if use_result {
            args_out.push(child_path.clone());
        }

        if dep.forward.unwrap_or(false) {
            ctx.forwarded_env = ctx.env.clone();
            ctx.forwarded_tools = ctx.tools.clone();
            ctx.forwarded_sandbox = ctx.sandbox.clone();
        }

        resolved_out.push(ResolvedDependency {
            alias,
            package: child_path,
            use_deps,
            use_environment,
            use_tools,
            use_sandbox,
            use_result,
        });
    }
    Ok(())
}

/// Alias resolution applies only to the first `::` segment of a relative
/// dependency name (spec.md §4.1); absolute paths (those already matching
/// a loaded recipe key) are used as-is.
fn resolve_alias(name: &str, registry: &LoadResult) -> String {
    if registry.get(name).is_some() {
        return name.to_string();
    }
    let mut segments: Vec<&str> = name.split("::").collect();
    if let Some(first) = segments.first().copied() {
        if let Some(alias) = registry.aliases.get(first) {
            let rest = segments.split_off(1);
            let mut rewritten: Vec<String> =
                alias.target.segments().iter().map(|s| s.as_str().to_string()).collect();
            rewritten.extend(rest.into_iter().map(str::to_string));
            return rewritten.join("::");
        }
    }
    name.to_string()
}

fn tool_contributions(tools: &[Tool]) -> Vec<ToolContribution> {
    tools
        .iter()
        .map(|t| ToolContribution {
            name: t.name.clone(),
            variant_id: t.variant_id.clone(),
            build_id: t.build_id.clone(),
            rel_path: t.rel_path.clone(),
            lib_paths: t.lib_paths.clone(),
        })
        .collect()
}

/// Looks up already-instantiated dependency packages for a step's ordered
/// argument list. Every path here was instantiated earlier in this same
/// recursive walk and is guaranteed present in `graph`.
fn lookup_args<'g>(graph: &'g PackageGraph, paths: &[PackagePath]) -> Vec<&'g Package> {
    paths
        .iter()
        .map(|p| graph.get(p).expect("dependency package instantiated before its consumer"))
        .collect()
}

fn select_tools(
    available: &[Tool],
    names: &BTreeSet<String>,
    path: &PackagePath,
    no_undefined_tools: bool,
) -> Result<Vec<Tool>> {
    let mut selected = Vec::new();
    for name in names {
        match available.iter().find(|t| t.name.as_str() == name) {
            Some(tool) => selected.push(tool.clone()),
            None if no_undefined_tools => {
                return Err(Error::UnresolvedTool {
                    package: path.clone(),
                    tool: name.clone(),
                });
            }
            None => {}
        }
    }
    Ok(selected)
}

/// Extracts the ordered [`Input`] list for a step, delegating the actual
/// hash computation to `bob-ident`. Exposed for the workspace
/// manager/scheduler once they need to key workspaces by identity.
pub fn step_inputs(
    role: StepRole,
    prior: Option<&Step>,
    args: &[&Package],
    tools: &[Tool],
    sandbox: Option<&Sandbox>,
) -> Vec<Input> {
    let prior_input = prior.and_then(|s| {
        Some(Input::PriorStep {
            variant_id: s.variant_id.clone()?,
            build_id: s.build_id.clone(),
        })
    });
    let dependency_args: Vec<Input> = args
        .iter()
        .filter_map(|pkg| {
            pkg.package.variant_id.clone().map(|variant_id| Input::DependencyArg {
                variant_id,
                build_id: pkg.package.build_id.clone(),
            })
        })
        .collect();
    let contributions = tool_contributions(tools);
    let sandbox_input = sandbox.map(|s| Input::Sandbox {
        variant_id: s.variant_id.clone(),
        build_id: s.build_id.clone(),
    });
    bob_ident::order_inputs(role.into(), prior_input, dependency_args, &contributions, sandbox_input)
}

#[cfg(test)]
mod instantiate_test {
    use super::*;
    use bob_recipe::{BobVersion, PolicySet};
    use std::collections::BTreeMap as Map;

    fn registry_from(recipes: Vec<(&str, bob_recipe::inherit::MergedRecipe)>, roots: Vec<&str>) -> LoadResult {
        let mut map = Map::new();
        for (name, merged) in recipes {
            map.insert(
                name.to_string(),
                bob_recipe::LoadedRecipe {
                    name: RecipeName::from_str(name).unwrap(),
                    is_root: roots.contains(&name),
                    merged,
                },
            );
        }
        LoadResult {
            recipes: map,
            roots: roots.into_iter().map(str::to_string).collect(),
            aliases: Default::default(),
            layers: Default::default(),
            policies: PolicySet::from_minimum_version(BobVersion::new(1, 4, 0)),
        }
    }

    #[test]
    fn instantiates_a_single_root_with_no_dependencies() {
        let mut merged = bob_recipe::inherit::MergedRecipe::default();
        merged.build_script = "make".to_string();
        let registry = registry_from(vec![("widget", merged)], vec!["widget"]);

        let graph = instantiate(&registry, &EnvMap::new()).unwrap();
        assert_eq!(graph.roots.len(), 1);
        let pkg = graph.get(&graph.roots[0]).unwrap();
        assert_eq!(pkg.build.script, "make");
    }

    #[test]
    fn dependency_environment_merges_back_into_parent() {
        let mut lib = bob_recipe::inherit::MergedRecipe::default();
        lib.provide_vars.insert("LIB_VERSION".to_string(), "1.0".to_string());

        let mut app = bob_recipe::inherit::MergedRecipe::default();
        app.depends.push(bob_recipe::yaml::DependencySpec {
            name: "lib".to_string(),
            ..Default::default()
        });

        let registry = registry_from(vec![("lib", lib), ("app", app)], vec!["app"]);
        let graph = instantiate(&registry, &EnvMap::new()).unwrap();

        let app_path = graph.roots.iter().find(|p| p.leaf().as_str() == "app").unwrap();
        let app_pkg = graph.get(app_path).unwrap();
        assert_eq!(app_pkg.env.get("LIB_VERSION").unwrap().as_hash_field(), "s1.0");
    }

    #[test]
    fn private_and_undeclared_environment_does_not_merge_back_into_parent() {
        let mut lib = bob_recipe::inherit::MergedRecipe::default();
        lib.environment.insert("LIB_PUBLIC_BUT_UNDECLARED".to_string(), "1".to_string());
        lib.private_environment.insert("LIB_SECRET".to_string(), "shh".to_string());

        let mut app = bob_recipe::inherit::MergedRecipe::default();
        app.depends.push(bob_recipe::yaml::DependencySpec {
            name: "lib".to_string(),
            ..Default::default()
        });

        let registry = registry_from(vec![("lib", lib), ("app", app)], vec!["app"]);
        let graph = instantiate(&registry, &EnvMap::new()).unwrap();

        let app_path = graph.roots.iter().find(|p| p.leaf().as_str() == "app").unwrap();
        let app_pkg = graph.get(app_path).unwrap();
        assert!(app_pkg.env.get("LIB_SECRET").is_none());
        assert!(app_pkg.env.get("LIB_PUBLIC_BUT_UNDECLARED").is_none());
    }

    #[test]
    fn missing_dependency_is_unresolved() {
        let mut app = bob_recipe::inherit::MergedRecipe::default();
        app.depends.push(bob_recipe::yaml::DependencySpec {
            name: "missing".to_string(),
            ..Default::default()
        });
        let registry = registry_from(vec![("app", app)], vec!["app"]);
        let err = instantiate(&registry, &EnvMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedDependency { .. }));
    }

    #[test]
    fn disabled_dependency_is_skipped() {
        let mut app = bob_recipe::inherit::MergedRecipe::default();
        app.depends.push(bob_recipe::yaml::DependencySpec {
            name: "missing".to_string(),
            if_cond: Some("false".to_string()),
            ..Default::default()
        });
        let registry = registry_from(vec![("app", app)], vec!["app"]);
        let graph = instantiate(&registry, &EnvMap::new()).unwrap();
        let app_pkg = graph.get(&graph.roots[0]).unwrap();
        assert!(app_pkg.dependencies.is_empty());
    }

    #[test]
    fn undefined_tool_is_rejected_under_no_undefined_tools() {
        let mut merged = bob_recipe::inherit::MergedRecipe::default();
        merged.build_tools.push("gcc".to_string());
        let registry = registry_from(vec![("widget", merged)], vec!["widget"]);
        let err = instantiate(&registry, &EnvMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedTool { .. }));
    }

    #[test]
    fn recipe_cycle_is_detected() {
        let mut a = bob_recipe::inherit::MergedRecipe::default();
        a.depends.push(bob_recipe::yaml::DependencySpec {
            name: "b".to_string(),
            ..Default::default()
        });
        let mut b = bob_recipe::inherit::MergedRecipe::default();
        b.depends.push(bob_recipe::yaml::DependencySpec {
            name: "a".to_string(),
            ..Default::default()
        });
        let registry = registry_from(vec![("a", a), ("b", b)], vec!["a"]);
        let err = instantiate(&registry, &EnvMap::new()).unwrap_err();
        assert!(matches!(err, Error::CycleError(_)));
    }
}
