// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The `shell(upload_cmd, download_cmd)` backend (spec.md §4.6): runs a
//! user-configured command for each direction, substituting `{path}` for
//! the local artifact file and `{id}` for the hex Build-Id/Artifact-Id.
//! Exists for storage systems with no library binding bob can call
//! directly (e.g. an internal `s3cp`-style wrapper script).

use std::process::Command;

use bob_ident::{ArtifactId, BuildId};
use tracing::instrument;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{ArtifactBundle, BackendFlags};

pub struct ShellBackend {
    upload_cmd: String,
    download_cmd: String,
    flags: BackendFlags,
}

impl ShellBackend {
    pub fn new(upload_cmd: impl Into<String>, download_cmd: impl Into<String>, flags: BackendFlags) -> Self {
        Self { upload_cmd: upload_cmd.into(), download_cmd: download_cmd.into(), flags }
    }

    fn expand(template: &str, id_hex: &str, path: &std::path::Path) -> String {
        template.replace("{id}", id_hex).replace("{path}", &path.to_string_lossy())
    }
}

impl Backend for ShellBackend {
    fn name(&self) -> &str {
        "shell"
    }

    fn flags(&self) -> BackendFlags {
        self.flags
    }

    #[instrument(skip(self), fields(backend = "shell"))]
    fn try_download(&self, build_id: &BuildId) -> Result<Option<ArtifactBundle>> {
        let tmp = tempfile::NamedTempFile::new()
            .map_err(|e| Error::Io { action: "create", path: std::env::temp_dir(), source: e })?;
        let command_line = Self::expand(&self.download_cmd, &build_id.to_hex(), tmp.path());
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .status()
            .map_err(|e| Error::Io { action: "spawn", path: tmp.path().to_path_buf(), source: e })?;
        if !status.success() {
            return Ok(None);
        }
        let bytes = std::fs::read(tmp.path())
            .map_err(|e| Error::Io { action: "read", path: tmp.path().to_path_buf(), source: e })?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(ArtifactBundle::new(bytes)))
    }

    #[instrument(skip(self, bundle), fields(backend = "shell", artifact = %artifact_id))]
    fn upload(&self, artifact_id: &ArtifactId, bundle: &ArtifactBundle) -> Result<()> {
        let tmp = tempfile::NamedTempFile::new()
            .map_err(|e| Error::Io { action: "create", path: std::env::temp_dir(), source: e })?;
        std::fs::write(tmp.path(), &bundle.bytes)
            .map_err(|e| Error::Io { action: "write", path: tmp.path().to_path_buf(), source: e })?;
        let command_line = Self::expand(&self.upload_cmd, &artifact_id.to_hex(), tmp.path());
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .status()
            .map_err(|e| Error::Io { action: "spawn", path: tmp.path().to_path_buf(), source: e })?;
        if !status.success() {
            return Err(Error::UploadFailed {
                backend: "shell".to_string(),
                reason: format!("command exited with {status}"),
            });
        }
        Ok(())
    }
}
