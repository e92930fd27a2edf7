// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

/// Per-backend capability flags. A backend participates in `tryDownload`
/// only when `download` is set, in `upload` only when `upload` is set; `cache`
/// marks it as a target for the caching-behavior backfill; `nofail` demotes
/// its upload/download errors from fatal to logged-and-skipped; `nolocal`
/// and `nojenkins` exclude the backend from the corresponding execution
/// context; `managed` marks a backend bob itself provisions and may prune.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct BackendFlags {
    pub download: bool,
    pub upload: bool,
    pub cache: bool,
    pub nofail: bool,
    pub nolocal: bool,
    pub nojenkins: bool,
    pub managed: bool,
}

impl BackendFlags {
    /// The common case: a backend used for both download and upload, with
    /// no other flags set.
    pub fn rw() -> Self {
        Self { download: true, upload: true, ..Self::default() }
    }

    /// A download-only mirror: never receives uploads.
    pub fn download_only() -> Self {
        Self { download: true, ..Self::default() }
    }
}

/// The gzipped tar payload of a step's workspace, held in memory between a
/// backend's download/upload call and the caller that requested it.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub bytes: Vec<u8>,
}

impl ArtifactBundle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}
