// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use bob_ident::BuildId;

use crate::types::StepKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("step {step} script exited with status {exit_code:?}")]
    ScriptFailed { step: StepKey, exit_code: Option<i32> },

    #[error("step {step} checkout failed: {reason}")]
    ScmFailed { step: StepKey, reason: String },

    #[error("step {step}: expected deterministic checkout build-id {expected} but got {actual}")]
    UnstableCheckout { step: StepKey, expected: BuildId, actual: BuildId },

    #[error("step {step} has no computed build-id; graph instantiation did not finish hashing")]
    MissingBuildId { step: StepKey },

    #[error("build cancelled")]
    Cancelled,

    #[error(transparent)]
    Workspace(#[from] bob_workspace::Error),

    #[error(transparent)]
    Audit(#[from] bob_audit::Error),

    #[error(transparent)]
    Cache(#[from] bob_cache::Error),

    #[error("sandbox setup failed: {0}")]
    Sandbox(String),

    #[error("io error during {action} of {path}: {source}")]
    Io { action: &'static str, path: std::path::PathBuf, source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
