// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bob archive` (spec.md §6 garbage collection, §4.6 `find`/`clean`/`scan`
//! maintenance API over the artifact cache).

use bob_audit::AuditRecord;
use clap::{Args, Subcommand};

use crate::cache_args::CacheArgs;
use crate::context::ProjectArgs;
use crate::error::Result;

#[derive(Debug, Clone, Args)]
pub struct ArchiveArgs {
    #[clap(flatten)]
    pub project: ProjectArgs,

    #[clap(flatten)]
    pub cache: CacheArgs,

    #[clap(subcommand)]
    pub action: ArchiveAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ArchiveAction {
    /// List every audit record matching a `find`-style boolean expression
    Find { expr: String },
    /// Remove every audit record (and its cached artifact) matching a
    /// `clean`-style expression, with an optional `LIMIT`/`ORDER BY`
    Clean { query: String },
}

fn read_all_records(audit_root: &std::path::Path) -> Result<Vec<AuditRecord>> {
    let mut records = Vec::new();
    let Ok(entries) = std::fs::read_dir(audit_root) else {
        return Ok(records);
    };
    for entry in entries {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) != Some("gz") {
            continue;
        }
        if let Ok(record) = bob_audit::read_record(&entry.path()) {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn archive(args: &ArchiveArgs) -> Result<i32> {
    let records = read_all_records(&args.project.audit_root())?;
    let cache = args.cache.build();

    match &args.action {
        ArchiveAction::Find { expr } => {
            let expr = bob_query::QueryExpr::parse(expr)?;
            let matched = bob_cache::maintenance::find(&records, &expr);
            for record in &matched {
                println!("{} {}", record.build_id, record.meta.recipe);
            }
            Ok(0)
        }
        ArchiveAction::Clean { query } => {
            let removed = cache.clean(&records, query).map_err(bob_core::Error::from)?;
            for build_id in &removed {
                println!("removed {build_id}");
            }
            Ok(0)
        }
    }
}
