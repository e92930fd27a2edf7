// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The audit trail recorder (spec.md §4.7): gzipped JSON provenance
//! records, one per completed step, with transitive-closure validation
//! and forward-compatible unknown-field tolerance.

pub mod error;
pub mod recorder;
pub mod types;
pub mod validate;

pub use error::{Error, Result};
pub use recorder::{build_references, read_record, write_record};
pub use types::{AuditRecord, BuildHost, DependencyRefs, JenkinsMeta, Meta, ScmRecord};
pub use validate::validate_transitive_closure;
