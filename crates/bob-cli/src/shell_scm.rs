// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The CLI's default [`ScmClient`]: runs a checkout script as a plain
//! subprocess, the same "illustrative fake" role the scheduler's own
//! tests give a `git`/`url` stand-in (spec.md §1 Non-goals: concrete SCM
//! wire protocols are out of scope; only the capability interface is
//! implemented). Every checkout is treated as deterministic, since
//! detecting a floating ref (`branch` without `commit`) is protocol
//! knowledge this client deliberately doesn't have.

use std::path::Path;

use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
use bob_scheduler::{CheckoutResult, ScmClient, StepKey};
use tokio::process::Command;

pub struct ShellScmClient;

#[async_trait::async_trait]
impl ScmClient for ShellScmClient {
    async fn checkout(&self, step: &StepKey, script: &str, work_dir: &Path) -> bob_scheduler::Result<CheckoutResult> {
        std::fs::create_dir_all(work_dir)
            .map_err(|source| bob_scheduler::Error::Io { action: "create", path: work_dir.to_path_buf(), source })?;

        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(work_dir)
            .output()
            .await
            .map_err(|source| bob_scheduler::Error::Io { action: "spawn checkout for", path: work_dir.to_path_buf(), source })?;

        if !output.status.success() {
            return Err(bob_scheduler::Error::ScmFailed {
                step: step.clone(),
                reason: format!("checkout script exited with {:?}", output.status.code()),
            });
        }

        let resolved_state = CanonicalHasher::new(HashAlgorithm::CURRENT)
            .update(script.as_bytes())
            .update(output.stdout.as_slice())
            .finish()
            .to_hex();

        Ok(CheckoutResult { resolved_state, indeterministic: false })
    }
}
