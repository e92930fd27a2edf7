// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The backend trait artifact cache backends implement (spec.md §4.6
//! "Backend capabilities"). Modeled on the teacher's `PayloadStorage`
//! split (`spfs::storage::fs::payloads`): a small, synchronous read/write
//! surface keyed by content identity, with "not found" distinguished from
//! a real I/O error so callers can fall through to the next backend.

use bob_ident::{ArtifactId, BuildId};

use crate::error::Result;
use crate::types::{ArtifactBundle, BackendFlags};

/// One artifact storage location: a local directory, an HTTP endpoint, a
/// pair of shell commands, or any other pluggable transport. `name()` is
/// used only for diagnostics and audit-record `build.host_name`-adjacent
/// logging, never for addressing.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn flags(&self) -> BackendFlags;

    /// Look up an artifact by its Build-Id. `Ok(None)` means the backend
    /// does not have it; callers try the next download backend in order.
    fn try_download(&self, build_id: &BuildId) -> Result<Option<ArtifactBundle>>;

    /// Place `bundle` at the location addressed by `artifact_id`. Since
    /// `ArtifactId` and `BuildId` always carry the same digest for a given
    /// artifact (`ArtifactId::from(&BuildId)` only ever copies it), this
    /// writes to the exact path a later `try_download` of that artifact's
    /// Build-Id will read from.
    fn upload(&self, artifact_id: &ArtifactId, bundle: &ArtifactBundle) -> Result<()>;

    /// Remove a stored artifact, used by the `clean` maintenance
    /// operation. Backends with no meaningful local delete semantics
    /// (e.g. a `shell` backend with no delete command configured) may
    /// leave this as a no-op.
    fn remove(&self, _build_id: &BuildId) -> Result<()> {
        Ok(())
    }
}
