// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use bob_ident::ArtifactId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The audit trail recorder's error taxonomy (spec.md §4.7).
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audit record at {0} is not valid JSON: {1}")]
    Malformed(PathBuf, serde_json::Error),

    #[error("audit record for {artifact} references {missing} transitively but no record for it is available")]
    IncompleteClosure { artifact: ArtifactId, missing: ArtifactId },
}
