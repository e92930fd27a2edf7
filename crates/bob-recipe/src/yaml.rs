// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The on-disk recipe/class YAML schema (spec.md §3 Recipe, §6 external
//! interfaces). These structs are the raw `serde_yaml` deserialization
//! target; [`crate::inherit`] merges them and [`crate::loader`] turns the
//! merged result into the loader's output types. Every string-valued field
//! that spec.md marks as template-capable is stored as source text here —
//! it is parsed into a [`bob_query::substitution::Template`] once, by
//! [`crate::loader`], not re-parsed on every use.

use std::collections::BTreeMap;

use serde::Deserialize;

/// One `.yaml` recipe or class file, as written on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RecipeFile {
    /// Classes this recipe/class inherits from, in declaration order.
    /// Depth-first, each-class-once merge order (spec.md §4.1).
    #[serde(default)]
    pub inherit: Vec<String>,

    #[serde(default)]
    pub root: Option<bool>,

    #[serde(default)]
    pub depends: Vec<DependencySpec>,

    #[serde(default, rename = "checkoutSCM")]
    pub checkout_scm: Option<ScmSpecYaml>,

    #[serde(default)]
    pub checkout_script: Option<String>,
    #[serde(default)]
    pub checkout_script_weak: Option<String>,
    #[serde(default)]
    pub checkout_tools: Vec<String>,
    #[serde(default)]
    pub checkout_tools_weak: Vec<String>,
    #[serde(default)]
    pub checkout_vars: Vec<String>,
    #[serde(default)]
    pub checkout_vars_weak: Vec<String>,
    #[serde(default)]
    pub checkout_deterministic: Option<bool>,
    #[serde(default, rename = "checkoutUpdateIf")]
    pub checkout_update_if: Option<String>,
    #[serde(default)]
    pub checkout_assert: Option<String>,

    #[serde(default)]
    pub build_script: Option<String>,
    #[serde(default)]
    pub build_tools: Vec<String>,
    #[serde(default)]
    pub build_tools_weak: Vec<String>,
    #[serde(default)]
    pub build_vars: Vec<String>,
    #[serde(default)]
    pub build_vars_weak: Vec<String>,

    #[serde(default)]
    pub package_script: Option<String>,
    #[serde(default)]
    pub package_tools: Vec<String>,
    #[serde(default)]
    pub package_tools_weak: Vec<String>,
    #[serde(default)]
    pub package_vars: Vec<String>,
    #[serde(default)]
    pub package_vars_weak: Vec<String>,
    #[serde(default)]
    pub package_depends: Vec<DependencySpec>,

    #[serde(default)]
    pub setup_script: Option<String>,
    #[serde(default)]
    pub setup_tools: Vec<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub private_environment: BTreeMap<String, String>,
    #[serde(default)]
    pub meta_environment: BTreeMap<String, String>,

    #[serde(default)]
    pub provide_deps: Vec<String>,
    #[serde(default)]
    pub provide_tools: BTreeMap<String, String>,
    #[serde(default)]
    pub provide_vars: BTreeMap<String, String>,
    #[serde(default, rename = "provideSandbox")]
    pub provide_sandbox: Option<SandboxSpecYaml>,

    #[serde(default, rename = "multiPackage")]
    pub multi_package: Vec<String>,

    #[serde(default)]
    pub shared: Option<bool>,
    #[serde(default)]
    pub relocatable: Option<bool>,

    #[serde(default)]
    pub fingerprint_script: Option<String>,
    #[serde(default)]
    pub fingerprint_vars: Vec<String>,
    #[serde(default, rename = "fingerprintIf")]
    pub fingerprint_if: Option<String>,

    /// Fields not recognized by any of the above, kept only so
    /// `noUndefinedTools`/unknown-key diagnostics can name them; never
    /// merged or evaluated.
    #[serde(skip)]
    pub source_path: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DependencySpec {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub use_deps: Option<bool>,
    #[serde(default)]
    pub use_environment: Option<bool>,
    #[serde(default)]
    pub use_tools: Option<bool>,
    #[serde(default)]
    pub use_sandbox: Option<bool>,
    #[serde(default)]
    pub use_result: Option<bool>,
    #[serde(default, rename = "if")]
    pub if_cond: Option<String>,
    /// Applied to the derived context before recursively instantiating
    /// the target recipe (spec.md §4.2 step 4: "apply per-dep
    /// environment overrides").
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub forward: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "scm", rename_all = "lowercase", deny_unknown_fields)]
pub enum ScmSpecYaml {
    Git {
        url: String,
        #[serde(default)]
        branch: Option<String>,
        #[serde(default)]
        tag: Option<String>,
        #[serde(default)]
        commit: Option<String>,
        #[serde(default)]
        dir: Option<String>,
    },
    Svn {
        url: String,
        #[serde(default)]
        revision: Option<String>,
        #[serde(default)]
        dir: Option<String>,
    },
    Cvs {
        cvsroot: String,
        module: String,
        #[serde(default)]
        tag: Option<String>,
        #[serde(default)]
        dir: Option<String>,
    },
    Url {
        url: String,
        #[serde(default, rename = "digestSha256")]
        digest_sha256: Option<String>,
        #[serde(default)]
        extract: Option<bool>,
        #[serde(default)]
        dir: Option<String>,
    },
    Import {
        path: String,
        #[serde(default)]
        dir: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxSpecYaml {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub mounts: Vec<MountSpecYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountSpecYaml {
    pub host: String,
    pub target: String,
    #[serde(default)]
    pub writable: bool,
}

/// An `alias.yaml`: a named shortcut that expands to a package path plus
/// optional substitution arguments (spec.md §3 Alias).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasFile {
    pub target: String,
    #[serde(default)]
    pub args: BTreeMap<String, String>,
}

/// A `layer.yaml` manifest describing one managed or unmanaged recipe
/// search-path layer (spec.md §3 Layer).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerFile {
    pub name: String,
    #[serde(default, rename = "recipeRoots")]
    pub recipe_roots: Vec<String>,
}

#[cfg(test)]
mod yaml_test {
    use super::*;

    #[test]
    fn minimal_recipe_parses() {
        let text = "inherit: [base]\nbuildScript: |\n  make\n";
        let parsed: RecipeFile = serde_yaml::from_str(text).unwrap();
        assert_eq!(parsed.inherit, vec!["base".to_string()]);
        assert_eq!(parsed.build_script.as_deref(), Some("make\n"));
    }

    #[test]
    fn git_scm_spec_parses() {
        let text = "scm: git\nurl: https://example.invalid/repo.git\nbranch: main\n";
        let parsed: ScmSpecYaml = serde_yaml::from_str(text).unwrap();
        match parsed {
            ScmSpecYaml::Git { url, branch, .. } => {
                assert_eq!(url, "https://example.invalid/repo.git");
                assert_eq!(branch.as_deref(), Some("main"));
            }
            other => panic!("expected Git variant, got {other:?}"),
        }
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let text = "bogusKey: true\n";
        assert!(serde_yaml::from_str::<RecipeFile>(text).is_err());
    }

    #[test]
    fn alias_file_parses_with_args() {
        let text = "target: lib::widget\nargs:\n  variant: debug\n";
        let parsed: AliasFile = serde_yaml::from_str(text).unwrap();
        assert_eq!(parsed.target, "lib::widget");
        assert_eq!(parsed.args.get("variant").map(String::as_str), Some("debug"));
    }
}
