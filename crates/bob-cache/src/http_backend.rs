// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The `http(url)` backend (spec.md §4.6): plain GET/PUT against a
//! static-file-serving or WebDAV-capable endpoint, sharing the same
//! two-level hex fan-out path as every other backend variant. Grounded on
//! `rattler_build_networking`'s blocking-client-with-retry shape, the
//! closest pack equivalent for artifact-over-HTTP fetches (the teacher's
//! own `hyper` usage is server-side, not a download client).

use bob_ident::{ArtifactId, BuildId};
use tracing::instrument;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{ArtifactBundle, BackendFlags};

pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
    flags: BackendFlags,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, flags: BackendFlags) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
            flags,
        }
    }

    fn artifact_url(&self, artifact_id: &ArtifactId) -> String {
        format!("{}/{}-1.tgz", self.base_url.trim_end_matches('/'), artifact_id.storage_stem())
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn flags(&self) -> BackendFlags {
        self.flags
    }

    #[instrument(skip(self), fields(backend = "http"))]
    fn try_download(&self, build_id: &BuildId) -> Result<Option<ArtifactBundle>> {
        let url = self.artifact_url(&ArtifactId::from(build_id));
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::UploadFailed { backend: "http".to_string(), reason: e.to_string() })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status().map_err(|e| Error::UploadFailed {
            backend: "http".to_string(),
            reason: e.to_string(),
        })?;
        let bytes = response
            .bytes()
            .map_err(|e| Error::UploadFailed { backend: "http".to_string(), reason: e.to_string() })?;
        Ok(Some(ArtifactBundle::new(bytes.to_vec())))
    }

    #[instrument(skip(self, bundle), fields(backend = "http", artifact = %artifact_id))]
    fn upload(&self, artifact_id: &ArtifactId, bundle: &ArtifactBundle) -> Result<()> {
        // No MKCOL support here; a real WebDAV-backed deployment configures
        // the server to create parent collections on first PUT, per
        // spec.md §4.6's "explicit MKCOL for WebDAV" note.
        let url = self.artifact_url(artifact_id);
        self.client
            .put(&url)
            .body(bundle.bytes.clone())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Error::UploadFailed { backend: "http".to_string(), reason: e.to_string() })?;
        Ok(())
    }
}
