// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The recipe loader's error taxonomy (spec.md §4.1, §7 `ConfigError`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("{path}: schema error: {message}")]
    SchemaError { path: PathBuf, message: String },

    #[error("{path}: unknown key {key:?}")]
    UnknownKey { path: PathBuf, key: String },

    #[error("policy violation in {path}: {message}")]
    PolicyViolation { path: PathBuf, message: String },

    #[error("failed to fetch managed layer {layer:?}: {message}")]
    LayerFetchError { layer: String, message: String },

    #[error("inheritance cycle detected: {0}")]
    CycleError(String),

    #[error("failed to resolve include {include:?} from {path}: {message}")]
    IncludeError {
        path: PathBuf,
        include: String,
        message: String,
    },

    #[error("{0}")]
    Substitution(#[from] bob_query::SubstError),

    #[error("invalid name: {0}")]
    InvalidName(#[from] bob_foundation::NameError),

    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    /// Several independent errors, collected instead of failing on the
    /// first one (spec.md §4.1: "aggregate independent errors where
    /// feasible").
    #[error("{} errors while loading recipes:\n{}", .0.len(), render_many(.0))]
    Many(Vec<Error>),
}

fn render_many(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    pub fn aggregate(errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.into_iter().next(),
            _ => Some(Error::Many(errors)),
        }
    }
}
