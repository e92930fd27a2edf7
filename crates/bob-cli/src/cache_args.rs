// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Command line flags selecting the artifact cache's backend fan-out
//! (spec.md §4.6), grounded on the teacher's `spfs_cli_common::Sync`
//! flags-to-collaborator pattern.

use bob_cache::{BackendFlags, Cache, FileBackend, HttpBackend};

#[derive(Debug, Clone, clap::Args)]
pub struct CacheArgs {
    /// Local, content-addressed cache directory consulted first and
    /// backfilled after a remote download
    #[clap(long, default_value = "work/.cache")]
    pub cache_dir: std::path::PathBuf,

    /// Remote WebDAV/HTTP artifact archive to download from and, with
    /// `--upload`, publish to
    #[clap(long)]
    pub remote_url: Option<String>,

    /// Upload newly-built artifacts to `--remote-url`
    #[clap(long)]
    pub upload: bool,

    /// A cache/remote failure falls through to local execution instead
    /// of failing the build
    #[clap(long)]
    pub nofail: bool,
}

impl CacheArgs {
    pub fn build(&self) -> Cache {
        let mut backends: Vec<Box<dyn bob_cache::Backend>> = Vec::new();

        if let Some(url) = &self.remote_url {
            backends.push(Box::new(HttpBackend::new(
                url.clone(),
                BackendFlags { download: true, upload: self.upload, cache: false, nofail: self.nofail, nolocal: false, nojenkins: false, managed: false },
            )));
        }

        backends.push(Box::new(FileBackend::new(
            &self.cache_dir,
            BackendFlags { download: true, upload: true, cache: true, nofail: self.nofail, nolocal: false, nojenkins: false, managed: true },
        )));

        Cache::new(backends)
    }
}
