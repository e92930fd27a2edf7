// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Workspace/project/user configuration loading: `config.yaml`, an
//! optional `default.yaml`, and `-c key=value`/`-c path.yaml` overrides
//! supplied on the CLI. Later sources win; `include:` entries are resolved
//! relative to the file that names them (or to the project root when the
//! `relativeIncludes` policy is `Old`).

use std::path::Path;

use relative_path::RelativePath;
use serde_yaml::Value;

use crate::error::{Error, Result};
use crate::policy::{BobVersion, PolicyName, PolicySet};

/// The fully merged configuration snapshot handed to the rest of the
/// loader: the resolved [`PolicySet`] plus the raw layer/plugin
/// declarations still owned by `bob-recipe` (layers are fetched by
/// `bob-workspace`, but which ones exist is config's job to say).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub policies: PolicySet,
    pub layers: Vec<LayerRef>,
    pub default_sandbox: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRef {
    pub name: String,
    /// `managed` layers are fetched through an SCM capability and cached;
    /// unmanaged ones are expected to already be present on disk.
    pub managed: bool,
    pub scm_kind: Option<String>,
    pub scm_url: Option<String>,
}

/// Loads `config.yaml` at `project_root`, then `default.yaml` if present,
/// then applies `overrides` (each either `key=value` dotted-path or a path
/// to another YAML file) in order, later entries winning.
pub fn load(project_root: &Path, overrides: &[String]) -> Result<Config> {
    let mut merged = Value::Null;

    let config_yaml = project_root.join("config.yaml");
    if config_yaml.exists() {
        merge_file(&mut merged, project_root, &config_yaml)?;
    }

    let default_yaml = project_root.join("default.yaml");
    if default_yaml.exists() {
        merge_file(&mut merged, project_root, &default_yaml)?;
    }

    for entry in overrides {
        if let Some((key, value)) = entry.split_once('=') {
            merge_dotted_key(&mut merged, key, Value::String(value.to_string()));
        } else {
            let path = project_root.join(entry);
            merge_file(&mut merged, project_root, &path)?;
        }
    }

    build_config(&merged)
}

/// Parses `path`, resolves its own `include:` list (relative to `path`'s
/// directory under the new `relativeIncludes` policy, or to
/// `project_root` under the old one — spec.md §4.1), then merges included
/// content first so `path`'s own keys take precedence over what it
/// includes.
fn merge_file(into: &mut Value, project_root: &Path, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
    let mut parsed: Value = serde_yaml::from_str(&text).map_err(|e| {
        let located = format_serde_error::SerdeError::new(text.clone(), e);
        Error::SchemaError {
            path: path.to_path_buf(),
            message: located.to_string(),
        }
    })?;

    let includes: Vec<String> = parsed
        .get("include")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    if let Value::Mapping(map) = &mut parsed {
        map.remove("include");
    }

    if !includes.is_empty() {
        let relative_includes = is_relative_includes_policy(&parsed);
        let base_dir = if relative_includes {
            path.parent().unwrap_or(project_root)
        } else {
            project_root
        };
        for include in &includes {
            let resolved = RelativePath::new(include).to_logical_path(base_dir);
            merge_file(into, project_root, &resolved)?;
        }
    }

    merge_values(into, parsed);
    Ok(())
}

/// A local, single-file read of the `relativeIncludes` policy, used only
/// to decide how *this file's own* `include:` entries resolve (the fully
/// merged [`PolicySet`] doesn't exist yet at this point in loading).
fn is_relative_includes_policy(local: &Value) -> bool {
    let bob_minimum_version = local
        .get("bobMinimumVersion")
        .and_then(Value::as_str)
        .and_then(|s| parse_version(s).ok())
        .unwrap_or_default();
    let mut policies = PolicySet::from_minimum_version(bob_minimum_version);
    if let Some(Value::Mapping(overrides)) = local.get("policies") {
        for (key, value) in overrides {
            if key.as_str() == Some("relativeIncludes") {
                if let Some(value_str) = value.as_str() {
                    if let Some((name, policy_value)) = parse_policy_entry("relativeIncludes", value_str) {
                        policies = policies.with_override(name, policy_value);
                    }
                }
            }
        }
    }
    policies.is_new(PolicyName::RelativeIncludes)
}

/// Deep-merge `b` on top of `a`: maps merge key-by-key, anything else
/// (scalars, sequences) is fully replaced by the later value.
fn merge_values(a: &mut Value, b: Value) {
    match (a, b) {
        (Value::Mapping(a_map), Value::Mapping(b_map)) => {
            for (k, v) in b_map {
                match a_map.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        a_map.insert(k, v);
                    }
                }
            }
        }
        (a_slot, b_val) => {
            *a_slot = b_val;
        }
    }
}

fn merge_dotted_key(into: &mut Value, dotted: &str, value: Value) {
    if !matches!(into, Value::Mapping(_)) {
        *into = Value::Mapping(Default::default());
    }
    let Value::Mapping(map) = into else { unreachable!() };
    match dotted.split_once('.') {
        None => {
            map.insert(Value::String(dotted.to_string()), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(Value::String(head.to_string()))
                .or_insert_with(|| Value::Mapping(Default::default()));
            merge_dotted_key(entry, rest, value);
        }
    }
}

fn build_config(merged: &Value) -> Result<Config> {
    let bob_minimum_version = merged
        .get("bobMinimumVersion")
        .and_then(Value::as_str)
        .map(parse_version)
        .transpose()?
        .unwrap_or_default();

    let mut policies = PolicySet::from_minimum_version(bob_minimum_version);
    if let Some(Value::Mapping(overrides)) = merged.get("policies") {
        for (key, value) in overrides {
            let Some(name) = key.as_str() else { continue };
            let Some(value_str) = value.as_str() else { continue };
            if let Some((policy_name, policy_value)) = parse_policy_entry(name, value_str) {
                policies = policies.with_override(policy_name, policy_value);
            }
        }
    }

    let layers = merged
        .get("layers")
        .and_then(Value::as_sequence)
        .map(|seq| seq.iter().filter_map(parse_layer_ref).collect())
        .unwrap_or_default();

    let default_sandbox = merged
        .get("defaultSandbox")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Config {
        policies,
        layers,
        default_sandbox,
    })
}

fn parse_version(s: &str) -> Result<BobVersion> {
    let mut parts = s.split('.');
    let major = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let minor = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let patch = parts.next().unwrap_or("0").parse().unwrap_or(0);
    Ok(BobVersion::new(major, minor, patch))
}

fn parse_policy_entry(
    name: &str,
    value: &str,
) -> Option<(crate::policy::PolicyName, crate::policy::PolicyValue)> {
    use crate::policy::{PolicyName, PolicyValue};
    let policy_name = match name {
        "relativeIncludes" => PolicyName::RelativeIncludes,
        "mergeEnvironment" => PolicyName::MergeEnvironment,
        "filter" => PolicyName::Filter,
        "cleanEnvironment" => PolicyName::CleanEnvironment,
        "noUndefinedTools" => PolicyName::NoUndefinedTools,
        "uniqueDependency" => PolicyName::UniqueDependency,
        "tidyUrlScm" => PolicyName::TidyUrlScm,
        "fixImportScmVariant" => PolicyName::FixImportScmVariant,
        "failUnstableCheckouts" => PolicyName::FailUnstableCheckouts,
        "scriptLanguage" => PolicyName::ScriptLanguage,
        "sandboxInvalidationFromTool" => PolicyName::SandboxInvalidationFromTool,
        _ => return None,
    };
    let policy_value = match value {
        "old" => PolicyValue::Old,
        "new" => PolicyValue::New,
        _ => return None,
    };
    Some((policy_name, policy_value))
}

fn parse_layer_ref(value: &Value) -> Option<LayerRef> {
    let map = value.as_mapping()?;
    let name = map.get("name")?.as_str()?.to_string();
    let managed = map.get("managed").and_then(Value::as_bool).unwrap_or(false);
    let scm_kind = map.get("scm").and_then(Value::as_str).map(str::to_string);
    let scm_url = map.get("url").and_then(Value::as_str).map(str::to_string);
    Some(LayerRef {
        name,
        managed,
        scm_kind,
        scm_url,
    })
}

#[cfg(test)]
mod config_test {
    use super::*;
    use crate::policy::{PolicyName, PolicyValue};

    #[test]
    fn dotted_override_sets_nested_key() {
        let mut merged = Value::Null;
        merge_dotted_key(&mut merged, "policies.filter", Value::String("old".into()));
        let config = build_config(&merged).unwrap();
        assert_eq!(config.policies.get(PolicyName::Filter), PolicyValue::Old);
    }

    #[test]
    fn bob_minimum_version_is_parsed() {
        let merged: Value = serde_yaml::from_str("bobMinimumVersion: \"1.0.0\"").unwrap();
        let config = build_config(&merged).unwrap();
        assert_eq!(config.policies.get(PolicyName::CleanEnvironment), PolicyValue::Old);
    }

    #[test]
    fn layers_are_parsed_from_mapping_sequence() {
        let merged: Value = serde_yaml::from_str(
            "layers:\n  - name: base\n    managed: true\n    scm: git\n    url: https://example.invalid/base.git\n",
        )
        .unwrap();
        let config = build_config(&merged).unwrap();
        assert_eq!(config.layers.len(), 1);
        assert!(config.layers[0].managed);
        assert_eq!(config.layers[0].scm_kind.as_deref(), Some("git"));
    }

    #[test]
    fn later_mapping_values_override_earlier_ones() {
        let mut merged: Value = serde_yaml::from_str("defaultSandbox: none\n").unwrap();
        merge_values(&mut merged, serde_yaml::from_str("defaultSandbox: strict\n").unwrap());
        let config = build_config(&merged).unwrap();
        assert_eq!(config.default_sandbox.as_deref(), Some("strict"));
    }

    #[test]
    fn new_style_include_resolves_relative_to_including_file() {
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(project.path().join("conf")).unwrap();
        std::fs::write(project.path().join("conf/base.yaml"), "defaultSandbox: strict\n").unwrap();
        std::fs::write(
            project.path().join("config.yaml"),
            "include: [conf/base.yaml]\n",
        )
        .unwrap();

        let config = load(project.path(), &[]).unwrap();
        assert_eq!(config.default_sandbox.as_deref(), Some("strict"));
    }

    #[test]
    fn includers_own_keys_override_included_keys() {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("base.yaml"), "defaultSandbox: strict\n").unwrap();
        std::fs::write(
            project.path().join("config.yaml"),
            "include: [base.yaml]\ndefaultSandbox: none\n",
        )
        .unwrap();

        let config = load(project.path(), &[]).unwrap();
        assert_eq!(config.default_sandbox.as_deref(), Some("none"));
    }
}
