// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Workspace directory allocation and retirement (spec.md §4.4): a
//! surjective, stable mapping from `(step Variant-Id, build mode)` to
//! workspace directory paths, plus the shared-location pool `shared: true`
//! packages install into under release/Jenkins mode.

pub mod error;
pub mod layout;
pub mod ledger;
pub mod manager;
pub mod shared;
pub mod types;

pub use error::{Error, Result};
pub use manager::WorkspaceManager;
pub use shared::SharedPool;
pub use types::{AtticPath, BuildMode, WorkspaceArea, WorkspaceKey, WorkspacePath};
