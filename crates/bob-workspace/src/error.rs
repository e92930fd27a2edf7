// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The workspace manager's error taxonomy (spec.md §4.4).
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace ledger at {0} is corrupt: {1}")]
    CorruptLedger(PathBuf, serde_json::Error),

    #[error("workspace {path} is not removable: {reason} (use force to override)")]
    NotRemovable { path: PathBuf, reason: String },

    #[error("shared location for artifact {artifact} is already held by a different variant")]
    SharedLocationConflict { artifact: String },
}
