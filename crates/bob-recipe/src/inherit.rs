// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Inheritance resolution and field merge (spec.md §4.1 "Inheritance
//! merge"): each recipe's `inherit:` list is linearized depth-first with
//! every class included exactly once, then fields are merged by
//! discipline — scripts concatenate, lists append with optional
//! `!pattern` filter removal, maps merge per the `mergeEnvironment`
//! policy.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::policy::{PolicyName, PolicySet};
use crate::yaml::{DependencySpec, RecipeFile, SandboxSpecYaml, ScmSpecYaml};

/// Depth-first, each-class-once linearization of `root`'s `inherit` chain.
/// Returns class names in merge order: earliest-inherited first, `root`
/// implicitly merged last by the caller (it is not itself in this list).
pub fn linearize(root: &str, classes: &BTreeMap<String, RecipeFile>) -> Result<Vec<String>> {
    let mut order = Vec::new();
    let mut seen = BTreeSet::new();
    let mut stack = Vec::new();
    visit(root, classes, &mut order, &mut seen, &mut stack)?;
    Ok(order)
}

fn visit(
    name: &str,
    classes: &BTreeMap<String, RecipeFile>,
    order: &mut Vec<String>,
    seen: &mut BTreeSet<String>,
    stack: &mut Vec<String>,
) -> Result<()> {
    if stack.contains(&name.to_string()) {
        let mut cycle = stack.clone();
        cycle.push(name.to_string());
        return Err(Error::CycleError(cycle.join(" -> ")));
    }
    let Some(class) = classes.get(name) else {
        // Unknown classes are reported by the loader (it has the file
        // path context); linearization only needs a best-effort order.
        return Ok(());
    };
    stack.push(name.to_string());
    for parent in &class.inherit {
        if !seen.contains(parent) {
            visit(parent, classes, order, seen, stack)?;
        }
    }
    stack.pop();
    if seen.insert(name.to_string()) {
        order.push(name.to_string());
    }
    Ok(())
}

/// The result of merging a linearized inheritance chain plus the leaf
/// recipe/class itself, in the field disciplines spec.md §4.1 describes.
#[derive(Debug, Clone, Default)]
pub struct MergedRecipe {
    pub checkout_script: String,
    pub build_script: String,
    pub package_script: String,
    pub setup_script: String,
    pub checkout_tools: Vec<String>,
    pub checkout_vars: Vec<String>,
    pub build_tools: Vec<String>,
    pub build_vars: Vec<String>,
    pub package_tools: Vec<String>,
    pub package_vars: Vec<String>,
    pub depends: Vec<DependencySpec>,
    pub package_depends: Vec<DependencySpec>,
    pub environment: BTreeMap<String, String>,
    pub private_environment: BTreeMap<String, String>,
    pub meta_environment: BTreeMap<String, String>,
    pub provide_deps: Vec<String>,
    pub provide_tools: BTreeMap<String, String>,
    pub provide_vars: BTreeMap<String, String>,
    /// Not merged across the inheritance chain — these top-level
    /// attributes are per-recipe, not per-class, and always taken from
    /// the leaf (spec.md §3: "Class: same shape as a Recipe minus some
    /// top-level attributes").
    pub root: bool,
    pub relocatable: bool,
    pub shared: bool,
    pub checkout_scm: Option<ScmSpecYaml>,
    pub provide_sandbox: Option<SandboxSpecYaml>,
    pub fingerprint_script: Option<String>,
    pub fingerprint_vars: Vec<String>,
}

/// Merge `chain` (inherited classes, earliest first) followed by `leaf`
/// (the recipe or class actually being loaded), honoring `policies`.
pub fn merge(chain: &[&RecipeFile], leaf: &RecipeFile, policies: &PolicySet) -> MergedRecipe {
    let mut merged = MergedRecipe::default();
    let all: Vec<&RecipeFile> = chain.iter().copied().chain(std::iter::once(leaf)).collect();

    for recipe in &all {
        concat_script(&mut merged.checkout_script, recipe.checkout_script.as_deref());
        concat_script(&mut merged.build_script, recipe.build_script.as_deref());
        concat_script(&mut merged.package_script, recipe.package_script.as_deref());
        concat_script(&mut merged.setup_script, recipe.setup_script.as_deref());
    }

    // `filter` policy: `Old` retains `!pattern` removal semantics; `New`
    // removes support for it (a `!pattern` entry is then kept verbatim,
    // intentionally inert, per spec.md: "new policies remove filter").
    let apply_filter_removal = !policies.is_new(PolicyName::Filter);

    merged.checkout_tools = merge_list(&all, |r| &r.checkout_tools, apply_filter_removal);
    merged.checkout_vars = merge_list(&all, |r| &r.checkout_vars, apply_filter_removal);
    merged.build_tools = merge_list(&all, |r| &r.build_tools, apply_filter_removal);
    merged.build_vars = merge_list(&all, |r| &r.build_vars, apply_filter_removal);
    merged.package_tools = merge_list(&all, |r| &r.package_tools, apply_filter_removal);
    merged.package_vars = merge_list(&all, |r| &r.package_vars, apply_filter_removal);
    merged.provide_deps = merge_list(&all, |r| &r.provide_deps, apply_filter_removal);

    for recipe in &all {
        merged.depends.extend(recipe.depends.iter().cloned());
        merged.package_depends.extend(recipe.package_depends.iter().cloned());
    }
    if policies.is_new(PolicyName::UniqueDependency) {
        dedup_depends(&mut merged.depends);
        dedup_depends(&mut merged.package_depends);
    }

    let new_merge_env = policies.is_new(PolicyName::MergeEnvironment);
    merged.environment = merge_map(&all, |r| &r.environment, new_merge_env);
    merged.private_environment = merge_map(&all, |r| &r.private_environment, new_merge_env);
    merged.meta_environment = merge_map(&all, |r| &r.meta_environment, new_merge_env);
    merged.provide_tools = merge_map(&all, |r| &r.provide_tools, new_merge_env);
    merged.provide_vars = merge_map(&all, |r| &r.provide_vars, new_merge_env);

    merged.root = leaf.root.unwrap_or(false);
    merged.relocatable = leaf.relocatable.unwrap_or(false);
    merged.shared = leaf.shared.unwrap_or(false);
    merged.checkout_scm = leaf.checkout_scm.clone();
    merged.provide_sandbox = leaf.provide_sandbox.clone();
    merged.fingerprint_script = leaf.fingerprint_script.clone();
    merged.fingerprint_vars = leaf.fingerprint_vars.clone();

    merged
}

fn concat_script(into: &mut String, addition: Option<&str>) {
    if let Some(text) = addition {
        if !into.is_empty() && !into.ends_with('\n') {
            into.push('\n');
        }
        into.push_str(text);
    }
}

/// Lists append in chain order (inherited first, leaf last); if
/// `apply_filter_removal`, an entry `!pattern` removes every
/// previously-appended entry matching `pattern` (a glob) instead of being
/// appended itself (spec.md "filter removal" example: `["!host-toolchain"]`
/// after `["*toolchain*"]` leaves no `host-toolchain`).
fn merge_list(
    all: &[&RecipeFile],
    field: impl Fn(&RecipeFile) -> &Vec<String>,
    apply_filter_removal: bool,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for recipe in all {
        for entry in field(recipe) {
            if apply_filter_removal {
                if let Some(pattern) = entry.strip_prefix('!') {
                    out.retain(|existing| !bob_query::bobpaths::glob_match(pattern, existing));
                    continue;
                }
            }
            out.push(entry.clone());
        }
    }
    out
}

/// Dedup by effective alias (spec.md §4.2 step 5: "no two active
/// dependencies may share the same name/alias"), keeping the last
/// occurrence so a recipe's own re-declaration of an inherited dependency
/// wins rather than being silently dropped.
fn dedup_depends(depends: &mut Vec<DependencySpec>) {
    let mut last_index = BTreeMap::new();
    for (i, d) in depends.iter().enumerate() {
        last_index.insert(d.alias.clone().unwrap_or_else(|| d.name.clone()), i);
    }
    let keep: BTreeSet<usize> = last_index.into_values().collect();
    let mut i = 0;
    depends.retain(|_| {
        let keep_this = keep.contains(&i);
        i += 1;
        keep_this
    });
}

/// Maps merge per the `mergeEnvironment` policy: under `New`, every
/// definition in the chain is kept with the leaf (and later classes)
/// taking precedence over earlier ones on key collision, matching
/// `BTreeMap::insert`'s last-writer-wins when iterated chain-order. Under
/// `Old`, the *first* definition encountered wins and later ones are
/// dropped (spec.md: "old behavior, first definition wins").
fn merge_map(
    all: &[&RecipeFile],
    field: impl Fn(&RecipeFile) -> &BTreeMap<String, String>,
    new_merge_environment: bool,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for recipe in all {
        for (k, v) in field(recipe) {
            if new_merge_environment {
                out.insert(k.clone(), v.clone());
            } else {
                out.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod inherit_test {
    use super::*;
    use crate::policy::BobVersion;

    fn class(inherit: &[&str]) -> RecipeFile {
        RecipeFile {
            inherit: inherit.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn diamond_inheritance_includes_each_class_once() {
        let mut classes = BTreeMap::new();
        classes.insert("top".to_string(), class(&["left", "right"]));
        classes.insert("left".to_string(), class(&["base"]));
        classes.insert("right".to_string(), class(&["base"]));
        classes.insert("base".to_string(), class(&[]));

        let order = linearize("top", &classes).unwrap();
        assert_eq!(order.iter().filter(|n| n.as_str() == "base").count(), 1);
        let base_pos = order.iter().position(|n| n == "base").unwrap();
        let left_pos = order.iter().position(|n| n == "left").unwrap();
        assert!(base_pos < left_pos, "base must be merged before the class that inherits it");
    }

    #[test]
    fn cycle_is_rejected() {
        let mut classes = BTreeMap::new();
        classes.insert("a".to_string(), class(&["b"]));
        classes.insert("b".to_string(), class(&["a"]));
        assert!(linearize("a", &classes).is_err());
    }

    #[test]
    fn scripts_concatenate_inherited_first() {
        let base = RecipeFile {
            build_script: Some("echo base".to_string()),
            ..Default::default()
        };
        let leaf = RecipeFile {
            build_script: Some("echo leaf".to_string()),
            ..Default::default()
        };
        let policies = PolicySet::default();
        let merged = merge(&[&base], &leaf, &policies);
        assert_eq!(merged.build_script, "echo base\necho leaf");
    }

    #[test]
    fn filter_removal_drops_matching_entries_under_old_policy() {
        let base = RecipeFile {
            build_tools: vec!["host-toolchain".to_string(), "other-toolchain".to_string()],
            ..Default::default()
        };
        let leaf = RecipeFile {
            build_tools: vec!["!host-toolchain".to_string()],
            ..Default::default()
        };
        let policies = PolicySet::from_minimum_version(BobVersion::new(0, 0, 0));
        let merged = merge(&[&base], &leaf, &policies);
        assert_eq!(merged.build_tools, vec!["other-toolchain".to_string()]);
    }

    #[test]
    fn filter_is_inert_under_new_policy() {
        let leaf = RecipeFile {
            build_tools: vec!["!host-toolchain".to_string()],
            ..Default::default()
        };
        let policies = PolicySet::default();
        let merged = merge(&[], &leaf, &policies);
        assert_eq!(merged.build_tools, vec!["!host-toolchain".to_string()]);
    }

    #[test]
    fn old_merge_environment_keeps_first_definition() {
        let base = RecipeFile {
            environment: BTreeMap::from([("X".to_string(), "base".to_string())]),
            ..Default::default()
        };
        let leaf = RecipeFile {
            environment: BTreeMap::from([("X".to_string(), "leaf".to_string())]),
            ..Default::default()
        };
        let policies = PolicySet::from_minimum_version(BobVersion::new(1, 0, 0));
        let merged = merge(&[&base], &leaf, &policies);
        assert_eq!(merged.environment.get("X").map(String::as_str), Some("base"));
    }

    #[test]
    fn new_merge_environment_lets_recipe_win() {
        let base = RecipeFile {
            environment: BTreeMap::from([("X".to_string(), "base".to_string())]),
            ..Default::default()
        };
        let leaf = RecipeFile {
            environment: BTreeMap::from([("X".to_string(), "leaf".to_string())]),
            ..Default::default()
        };
        let policies = PolicySet::default();
        let merged = merge(&[&base], &leaf, &policies);
        assert_eq!(merged.environment.get("X").map(String::as_str), Some("leaf"));
    }

    #[test]
    fn unique_dependency_policy_dedups_by_name() {
        let base = RecipeFile {
            depends: vec![DependencySpec {
                name: "lib".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let leaf = RecipeFile {
            depends: vec![DependencySpec {
                name: "lib".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let policies = PolicySet::default();
        let merged = merge(&[&base], &leaf, &policies);
        assert_eq!(merged.depends.len(), 1);
    }
}
