// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

/// Which top-level layout a project is currently building under
/// (spec.md §4.4 "Layout"). Jenkins mode derives its job name from the
/// recipe name plus an optional operator-supplied prefix.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BuildMode {
    Dev,
    Release,
    Jenkins { job_prefix: Option<String> },
}

/// One of a package's three working areas, each with its own workspace
/// directory (spec.md §4.4 layout: `{src,build,dist}`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum WorkspaceArea {
    Src,
    Build,
    Dist,
}

impl WorkspaceArea {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceArea::Src => "src",
            WorkspaceArea::Build => "build",
            WorkspaceArea::Dist => "dist",
        }
    }
}

/// A resolved, on-disk workspace directory for one (package, area)
/// pairing. The `workspace` leaf component always exists per spec.md's
/// layout tables (`.../<suffix>/workspace`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WorkspacePath(PathBuf);

impl WorkspacePath {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

/// Where a retired or unreconcilable workspace is moved instead of being
/// deleted outright (spec.md §4.4 `promoteAttic`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AtticPath(PathBuf);

impl AtticPath {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// The identity a workspace is keyed by: a step's Variant-Id, scoped to
/// one package path and build mode (spec.md §4.4 "surjective, stable
/// mapping from (step Variant-Id, build mode) to workspace directory
/// paths").
#[derive(Debug, Clone)]
pub struct WorkspaceKey {
    pub package: bob_foundation::PackagePath,
    pub area: WorkspaceArea,
    pub variant_id: bob_ident::VariantId,
}
