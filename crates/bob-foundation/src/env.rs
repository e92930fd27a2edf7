// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! A canonical, order-stable environment map. Used for both the
//! environment a step consumes at execution time and as an input to the
//! identity engine's hashing (spec.md §4.3: "Env maps are sorted by key;
//! empty values distinguishable from unset").

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value that is either set (possibly to an empty string) or entirely
/// unset. Kept distinct from `Option<String>` at call sites so it is clear
/// this encodes "declared but empty" vs "not declared at all".
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Set(String),
    Unset,
}

impl EnvValue {
    pub fn as_hash_field(&self) -> String {
        match self {
            // "s" / "u" tags keep Set("") distinguishable from Unset even
            // though both would otherwise serialize to an empty string.
            EnvValue::Set(v) => format!("s{v}"),
            EnvValue::Unset => "u".to_string(),
        }
    }
}

/// A sorted map of environment variable names to values. `BTreeMap` gives
/// us the sorted-by-key iteration order the identity engine requires for
/// free, and keeps `Eq`/`Hash`/`Ord` well defined.
#[derive(Debug, Default, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvMap(BTreeMap<String, EnvValue>);

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), EnvValue::Set(value.into()));
        self
    }

    pub fn unset(&mut self, key: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), EnvValue::Unset);
        self
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EnvValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` on top of `self`; keys in `other` win. Used for
    /// per-dependency `environment` overrides and the new `mergeEnvironment`
    /// layering described in spec.md §4.1.
    pub fn merge_overriding(&mut self, other: &EnvMap) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Collapse to the plain key/value pairs a subprocess actually sees,
    /// dropping explicitly-unset variables.
    pub fn to_process_env(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(k, v)| match v {
                EnvValue::Set(s) => Some((k.clone(), s.clone())),
                EnvValue::Unset => None,
            })
            .collect()
    }

    /// Restrict this map to a declared subset of variable names, used when
    /// a step only consumes a named subset of the inherited environment
    /// (spec.md §4.2 step 6: "sliding pipeline").
    pub fn subset(&self, names: impl IntoIterator<Item = impl AsRef<str>>) -> EnvMap {
        let wanted: std::collections::BTreeSet<String> =
            names.into_iter().map(|n| n.as_ref().to_string()).collect();
        EnvMap(
            self.0
                .iter()
                .filter(|(k, _)| wanted.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for EnvMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = EnvMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

#[cfg(test)]
mod env_test {
    use super::*;

    #[test]
    fn set_empty_differs_from_unset() {
        let mut a = EnvMap::new();
        a.set("X", "");
        let mut b = EnvMap::new();
        b.unset("X");
        assert_ne!(
            a.get("X").unwrap().as_hash_field(),
            b.get("X").unwrap().as_hash_field()
        );
    }

    #[test]
    fn merge_overriding_prefers_later_map() {
        let mut base = EnvMap::new();
        base.set("A", "1").set("B", "2");
        let mut overlay = EnvMap::new();
        overlay.set("B", "3");
        base.merge_overriding(&overlay);
        assert_eq!(base.get("A").unwrap(), &EnvValue::Set("1".into()));
        assert_eq!(base.get("B").unwrap(), &EnvValue::Set("3".into()));
    }

    #[test]
    fn subset_keeps_only_named_keys() {
        let mut map = EnvMap::new();
        map.set("A", "1").set("B", "2").set("C", "3");
        let subset = map.subset(["A", "C"]);
        assert_eq!(subset.len(), 2);
        assert!(subset.get("B").is_none());
    }

    #[test]
    fn iteration_is_sorted_by_key() {
        let mut map = EnvMap::new();
        map.set("Z", "1").set("A", "2");
        let keys: Vec<&String> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "Z"]);
    }
}
