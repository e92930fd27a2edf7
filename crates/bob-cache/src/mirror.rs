// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Mirror aggregation (spec.md §4.6 "Mirrors"): ordered pre-mirror and
//! fallback-mirror lists consulted around a deterministic URL SCM's
//! primary source. Unrelated to artifact backend download order.

/// Ordered candidate URLs for a single deterministic URL SCM fetch:
/// pre-mirrors first, then the primary, then fallback-mirrors.
#[derive(Debug, Clone, Default)]
pub struct MirrorList {
    pub pre_mirrors: Vec<String>,
    pub fallback_mirrors: Vec<String>,
}

impl MirrorList {
    pub fn new(pre_mirrors: Vec<String>, fallback_mirrors: Vec<String>) -> Self {
        Self { pre_mirrors, fallback_mirrors }
    }

    /// The full try-order for `primary`: this list never reorders or
    /// drops the primary URL itself, only surrounds it.
    pub fn ordered_candidates<'a>(&'a self, primary: &'a str) -> impl Iterator<Item = &'a str> {
        self.pre_mirrors
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(primary))
            .chain(self.fallback_mirrors.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod mirror_test {
    use super::*;

    #[test]
    fn pre_mirrors_precede_primary_which_precedes_fallbacks() {
        let mirrors = MirrorList::new(vec!["https://pre.example".to_string()], vec!["https://fallback.example".to_string()]);
        let ordered: Vec<&str> = mirrors.ordered_candidates("https://primary.example").collect();
        assert_eq!(ordered, vec!["https://pre.example", "https://primary.example", "https://fallback.example"]);
    }

    #[test]
    fn empty_mirror_list_yields_only_primary() {
        let mirrors = MirrorList::default();
        let ordered: Vec<&str> = mirrors.ordered_candidates("https://only.example").collect();
        assert_eq!(ordered, vec!["https://only.example"]);
    }
}
