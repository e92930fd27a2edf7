// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use bob_foundation::PackagePath;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The graph instantiator's error taxonomy (spec.md §4.2).
#[derive(Debug, Error)]
pub enum Error {
    #[error("{package}: tool {tool:?} is not defined by any active dependency or the recipe itself")]
    UnresolvedTool { package: PackagePath, tool: String },

    #[error("{package}: dependency {dependency:?} does not resolve to a known recipe")]
    UnresolvedDependency { package: PackagePath, dependency: String },

    #[error("{package}: two active dependencies both resolve to {name:?}, violating uniqueDependency")]
    VariantConflict { package: PackagePath, name: String },

    #[error("recipe cycle detected: {0}")]
    CycleError(String),

    #[error("{package}: failed to propagate context: {message}")]
    PropagationError { package: PackagePath, message: String },

    #[error("{0}")]
    Substitution(#[from] bob_query::SubstError),

    #[error("{0}")]
    Recipe(#[from] bob_recipe::Error),

    #[error("{0}")]
    InvalidName(#[from] bob_foundation::NameError),
}
