// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The artifact cache and mirror aggregation layer (spec.md §4.6):
//! content-addressed download/upload across pluggable backends, result
//! hash verification, cache backfill, and the `find`/`clean`/`scan`
//! maintenance API.

pub mod backend;
pub mod cache;
pub mod error;
pub mod file_backend;
pub mod http_backend;
pub mod maintenance;
pub mod mirror;
pub mod shell_backend;
pub mod types;
pub mod verify;

pub use backend::Backend;
pub use cache::Cache;
pub use error::{Error, Result};
pub use file_backend::FileBackend;
pub use http_backend::HttpBackend;
pub use mirror::MirrorList;
pub use shell_backend::ShellBackend;
pub use types::{ArtifactBundle, BackendFlags};
