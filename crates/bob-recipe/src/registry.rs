// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The recipe loader's output type: a read-only registry of merged
//! recipes plus the declared roots and effective policy snapshot
//! (spec.md §4.1: `load(...) -> LoadResult`).

use std::collections::BTreeMap;

use bob_foundation::RecipeName;

use crate::alias::AliasRegistry;
use crate::inherit::MergedRecipe;
use crate::layer::LayerStack;
use crate::policy::PolicySet;

/// One fully merged, substitution-template-bearing recipe or class, keyed
/// by its simple name (not yet a [`bob_foundation::PackagePath`] — that
/// identity only exists once the graph instantiator places it at a
/// specific point in the dependency DAG, spec.md §4.2).
#[derive(Debug, Clone)]
pub struct LoadedRecipe {
    pub name: RecipeName,
    pub is_root: bool,
    pub merged: MergedRecipe,
}

#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    pub recipes: BTreeMap<String, LoadedRecipe>,
    pub roots: Vec<String>,
    pub aliases: AliasRegistry,
    pub layers: LayerStack,
    pub policies: PolicySet,
}

impl LoadResult {
    pub fn get(&self, name: &str) -> Option<&LoadedRecipe> {
        self.recipes.get(name)
    }
}
