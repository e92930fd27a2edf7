// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Aliases: named shortcuts that resolve to a package path plus a fixed
//! set of substitution arguments (spec.md §3 Alias). Resolution is a
//! single lookup, not recursive — an alias that targets another alias is
//! a schema error, matching spec.md's "aliases do not chain" note.

use std::collections::BTreeMap;
use std::path::Path;

use bob_foundation::PackagePath;

use crate::error::{Error, Result};
use crate::yaml::AliasFile;

#[derive(Debug, Clone)]
pub struct Alias {
    pub target: PackagePath,
    pub args: BTreeMap<String, String>,
}

impl Alias {
    pub fn from_yaml(yaml: &AliasFile, path: &Path) -> Result<Self> {
        let target = yaml.target.parse::<PackagePath>().map_err(|_| Error::SchemaError {
            path: path.to_path_buf(),
            message: format!("invalid alias target {:?}", yaml.target),
        })?;
        Ok(Self {
            target,
            args: yaml.args.clone(),
        })
    }
}

/// A registry of alias name -> resolved [`Alias`], populated from every
/// `*.alias.yaml` file found under the recipe search path.
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry(BTreeMap<String, Alias>);

impl AliasRegistry {
    pub fn insert(&mut self, name: impl Into<String>, alias: Alias) {
        self.0.insert(name.into(), alias);
    }

    pub fn get(&self, name: &str) -> Option<&Alias> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod alias_test {
    use super::*;

    #[test]
    fn alias_resolves_to_package_path() {
        let yaml = AliasFile {
            target: "lib::widget".to_string(),
            args: BTreeMap::from([("variant".to_string(), "debug".to_string())]),
        };
        let alias = Alias::from_yaml(&yaml, Path::new("widget.alias.yaml")).unwrap();
        assert_eq!(alias.target.to_string(), "lib::widget");
        assert_eq!(alias.args.get("variant").map(String::as_str), Some("debug"));
    }

    #[test]
    fn invalid_target_is_a_schema_error() {
        let yaml = AliasFile {
            target: "".to_string(),
            args: BTreeMap::new(),
        };
        assert!(Alias::from_yaml(&yaml, Path::new("bad.alias.yaml")).is_err());
    }

    #[test]
    fn registry_looks_up_by_name() {
        let mut registry = AliasRegistry::default();
        let yaml = AliasFile {
            target: "lib::widget".to_string(),
            args: BTreeMap::new(),
        };
        registry.insert("widget", Alias::from_yaml(&yaml, Path::new("widget.alias.yaml")).unwrap());
        assert!(registry.get("widget").is_some());
        assert!(registry.get("missing").is_none());
    }
}
