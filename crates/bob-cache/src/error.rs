// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use bob_ident::BuildId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to {action} {path}: {source}")]
    Io { action: &'static str, path: PathBuf, source: std::io::Error },

    #[error("backend {backend:?} upload failed: {reason}")]
    UploadFailed { backend: String, reason: String },

    #[error("downloaded artifact for build-id {build_id} failed hash verification")]
    VerificationFailed { build_id: BuildId },

    #[error("audit record error: {0}")]
    Audit(#[from] bob_audit::Error),

    #[error("query expression error: {0}")]
    Query(#[from] bob_query::QueryExprError),
}

pub type Result<T> = std::result::Result<T, Error>;
