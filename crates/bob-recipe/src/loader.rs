// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The recipe loader's top-level entry point (spec.md §4.1): discovers
//! `recipes/*.yaml`, `classes/*.yaml` and `aliases/*.yaml` across the
//! layer stack, resolves inheritance, applies policy gates, and produces
//! a [`LoadResult`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::instrument;
use walkdir::WalkDir;

use crate::alias::{Alias, AliasRegistry};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::inherit::{linearize, merge};
use crate::layer::{Layer, LayerStack};
use crate::registry::{LoadedRecipe, LoadResult};
use crate::scm::ScmSpec;
use crate::yaml::{AliasFile, RecipeFile};

/// Loads the full recipe graph rooted at `project_root`.
///
/// `user_configs` are additional `-c` overrides (dotted `key=value` or
/// relative paths to further YAML files), applied after `config.yaml` and
/// `default.yaml`. `defines` are `key=value` pairs injected as initial
/// substitution variables available to every recipe (`bob build -DFOO=bar`
/// style). `layer_config_overrides` lets the caller pin managed-layer
/// revisions without editing `config.yaml` (e.g. `bob build --layer
/// base=refs/heads/release`), and is currently only validated, since
/// fetching a managed layer is the Workspace Manager's job (spec.md §4.4),
/// not the loader's.
#[instrument(skip_all, fields(project_root = %project_root.display()))]
pub fn load(
    project_root: &Path,
    user_configs: &[String],
    defines: &[String],
    layer_config_overrides: &[String],
) -> Result<LoadResult> {
    let config = crate::config::load(project_root, user_configs)?;
    // `defines` (`bob build -DFOO=bar`) seed the graph instantiator's
    // initial substitution context; the loader itself only needs to
    // accept them so the CLI's full invocation surface round-trips.
    let _ = defines;

    let layers = build_layer_stack(project_root, &config, layer_config_overrides)?;

    let mut classes: BTreeMap<String, RecipeFile> = BTreeMap::new();
    let mut recipe_files: BTreeMap<String, (RecipeFile, PathBuf)> = BTreeMap::new();
    let mut aliases = AliasRegistry::default();
    let mut errors = Vec::new();

    for layer in layers.layers() {
        let Some(root) = &layer.root else { continue };

        for (name, path) in discover_yaml(&root.join("classes")) {
            match parse_yaml_file::<RecipeFile>(&path) {
                Ok(mut file) => {
                    file.source_path = Some(path.clone());
                    classes.insert(name, file);
                }
                Err(e) => errors.push(e),
            }
        }

        for (name, path) in discover_yaml(&root.join("recipes")) {
            match parse_yaml_file::<RecipeFile>(&path) {
                Ok(mut file) => {
                    file.source_path = Some(path.clone());
                    recipe_files.insert(name, (file, path));
                }
                Err(e) => errors.push(e),
            }
        }

        for (name, path) in discover_yaml(&root.join("aliases")) {
            match parse_yaml_file::<AliasFile>(&path).and_then(|yaml| Alias::from_yaml(&yaml, &path)) {
                Ok(alias) => aliases.insert(name, alias),
                Err(e) => errors.push(e),
            }
        }
    }

    let mut recipes = BTreeMap::new();
    let mut roots = Vec::new();

    for (name, (file, path)) in &recipe_files {
        match load_one_recipe(name, file, path, &classes, &config) {
            Ok(loaded) => {
                if loaded.is_root {
                    roots.push(name.clone());
                }
                recipes.insert(name.clone(), loaded);
            }
            Err(e) => errors.push(e),
        }
    }
    roots.sort();

    if let Some(error) = Error::aggregate(errors) {
        return Err(error);
    }

    Ok(LoadResult {
        recipes,
        roots,
        aliases,
        layers,
        policies: config.policies,
    })
}

fn load_one_recipe(
    name: &str,
    file: &RecipeFile,
    path: &Path,
    classes: &BTreeMap<String, RecipeFile>,
    config: &Config,
) -> Result<LoadedRecipe> {
    let chain_names = linearize(name, &{
        // `linearize` expects the leaf present in the map only so it can
        // read its own `inherit` list; recipes live in a separate map from
        // classes, so splice it in for this call.
        let mut with_leaf = classes.clone();
        with_leaf.insert(name.to_string(), file.clone());
        with_leaf
    })?;
    let chain: Vec<&RecipeFile> = chain_names
        .iter()
        .filter(|n| n.as_str() != name)
        .filter_map(|n| classes.get(n))
        .collect();

    let merged = merge(&chain, file, &config.policies);

    if let Some(scm_yaml) = &file.checkout_scm {
        let spec = ScmSpec::from_yaml(scm_yaml)?;
        crate::scm::validate_policy(&spec, &config.policies, path)?;
    }

    let recipe_name = name
        .rsplit("::")
        .next()
        .unwrap_or(name)
        .parse()
        .map_err(|_| Error::SchemaError {
            path: path.to_path_buf(),
            message: format!("invalid recipe name derived from path {name:?}"),
        })?;

    Ok(LoadedRecipe {
        name: recipe_name,
        is_root: file.root.unwrap_or(false),
        merged,
    })
}

fn build_layer_stack(
    project_root: &Path,
    config: &Config,
    layer_config_overrides: &[String],
) -> Result<LayerStack> {
    let pinned: BTreeMap<&str, &str> = layer_config_overrides
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .collect();

    let mut layers = LayerStack::default();
    for layer_ref in &config.layers {
        if layer_ref.managed {
            return Err(Error::LayerFetchError {
                layer: layer_ref.name.clone(),
                message: format!(
                    "managed layer fetch requires a workspace manager collaborator (pinned revision: {:?})",
                    pinned.get(layer_ref.name.as_str())
                ),
            });
        }
        let root = project_root.join("layers").join(&layer_ref.name);
        layers.push(Layer::from_config(layer_ref).materialized(root));
    }
    layers.push(Layer {
        name: "project".to_string(),
        managed: false,
        scm_kind: None,
        scm_url: None,
        root: Some(project_root.to_path_buf()),
    });
    Ok(layers)
}

/// Walks `dir` for `*.yaml` files, deriving each package name from its
/// path relative to `dir` with `::` separators (spec.md §4.1: "Package
/// name is derived from relative path with `::` separator"). Missing
/// directories yield no entries rather than an error.
fn discover_yaml(dir: &Path) -> Vec<(String, PathBuf)> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(std::ffi::OsStr::to_str) != Some("yaml") {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let name = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("::");
        found.push((name, path.to_path_buf()));
    }
    found
}

fn parse_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
    serde_yaml::from_str(&text).map_err(|e| {
        let located = format_serde_error::SerdeError::new(text.clone(), e);
        Error::SchemaError {
            path: path.to_path_buf(),
            message: located.to_string(),
        }
    })
}

#[cfg(test)]
mod loader_test {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn loads_a_single_root_recipe_with_inherited_class() {
        let project = tempfile::tempdir().unwrap();
        write(project.path(), "classes/toolchain.yaml", "buildTools: [cc]\n");
        write(
            project.path(),
            "recipes/hello.yaml",
            "root: true\ninherit: [toolchain]\nbuildScript: |\n  make\n",
        );

        let result = load(project.path(), &[], &[], &[]).unwrap();
        assert_eq!(result.roots, vec!["hello".to_string()]);
        let hello = result.get("hello").unwrap();
        assert!(hello.is_root);
        assert_eq!(hello.merged.build_tools, vec!["cc".to_string()]);
        assert_eq!(hello.merged.build_script.trim(), "make");
    }

    #[test]
    fn nested_recipe_path_uses_double_colon_name() {
        let project = tempfile::tempdir().unwrap();
        write(project.path(), "recipes/lib/widget.yaml", "inherit: []\n");

        let result = load(project.path(), &[], &[], &[]).unwrap();
        assert!(result.get("lib::widget").is_some());
    }

    #[test]
    fn schema_errors_are_aggregated_not_fail_fast() {
        let project = tempfile::tempdir().unwrap();
        write(project.path(), "recipes/a.yaml", "bogusKey: true\n");
        write(project.path(), "recipes/b.yaml", "alsoBogus: true\n");

        let err = load(project.path(), &[], &[], &[]).unwrap_err();
        match err {
            Error::Many(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregated errors, got {other}"),
        }
    }

    #[test]
    fn managed_layer_without_workspace_manager_fails() {
        let project = tempfile::tempdir().unwrap();
        write(
            project.path(),
            "config.yaml",
            "layers:\n  - name: base\n    managed: true\n    scm: git\n    url: https://example.invalid/base.git\n",
        );

        let err = load(project.path(), &[], &[], &[]).unwrap_err();
        assert!(matches!(err, Error::LayerFetchError { .. }));
    }
}
