// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The `find`/`clean`/`scan` maintenance API (spec.md §4.6), built
//! directly on the already-implemented `bob_query` boolean expression
//! language over `meta.*`/`metaEnv.*` audit-trail keys.

use std::path::{Path, PathBuf};

use bob_audit::AuditRecord;
use bob_query::{CleanQuery, QueryExpr, SortOrder};

use crate::error::Result;

/// Resolve a dotted key (`meta.recipe`, `metaEnv.ARCH`) against one audit
/// record, the lookup function every `QueryExpr::eval` call needs.
pub fn record_lookup(record: &AuditRecord) -> impl Fn(&str) -> Option<String> + '_ {
    move |key: &str| {
        if let Some(field) = key.strip_prefix("meta.") {
            match field {
                "recipe" => Some(record.meta.recipe.clone()),
                "step" => Some(record.meta.step.clone()),
                "package" => Some(record.meta.package.clone()),
                "bobVersion" | "bob_version" => Some(record.meta.bob_version.clone()),
                "scriptLanguage" | "script_language" => Some(record.meta.script_language.clone()),
                "jenkinsJob" => record.meta.jenkins.as_ref().map(|j| j.job_name.clone()),
                _ => None,
            }
        } else if let Some(field) = key.strip_prefix("metaEnv.") {
            record.meta_env.get(field).cloned()
        } else {
            None
        }
    }
}

/// `find(expr)`: every record the expression accepts.
pub fn find<'a>(records: impl IntoIterator<Item = &'a AuditRecord>, expr: &QueryExpr) -> Vec<&'a AuditRecord> {
    records.into_iter().filter(|r| expr.eval(&record_lookup(r))).collect()
}

/// `clean(expr [, LIMIT n [ORDER BY key [ASC|DESC]]])`'s selection half:
/// matching records, sorted and limited. Actual removal is the caller's
/// job (see [`crate::cache::Cache::clean`]), since only the cache knows
/// which backends own the corresponding storage.
pub fn select_for_clean<'a>(records: impl IntoIterator<Item = &'a AuditRecord>, query: &CleanQuery) -> Vec<&'a AuditRecord> {
    let mut matched: Vec<&AuditRecord> = find(records, &query.expr);
    if let Some((key, order)) = &query.order_by {
        matched.sort_by(|a, b| {
            let av = record_lookup(a)(key);
            let bv = record_lookup(b)(key);
            let ordering = av.cmp(&bv);
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
}

/// `scan(path)`: every artifact file path present under the two-level hex
/// fan-out directory tree rooted at `path`.
pub fn scan(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !root.exists() {
        return Ok(found);
    }
    for level1 in read_dir(root)? {
        let level1 = level1.map_err(|source| io_err("scan", root, source))?;
        if !level1.file_type().map_err(|source| io_err("scan", &level1.path(), source))?.is_dir() {
            continue;
        }
        for level2 in read_dir(&level1.path())? {
            let level2 = level2.map_err(|source| io_err("scan", &level1.path(), source))?;
            if !level2.file_type().map_err(|source| io_err("scan", &level2.path(), source))?.is_dir() {
                continue;
            }
            for entry in read_dir(&level2.path())? {
                let entry = entry.map_err(|source| io_err("scan", &level2.path(), source))?;
                if entry.file_type().map_err(|source| io_err("scan", &entry.path(), source))?.is_file() {
                    found.push(entry.path());
                }
            }
        }
    }
    Ok(found)
}

fn read_dir(path: &Path) -> Result<std::fs::ReadDir> {
    std::fs::read_dir(path).map_err(|source| io_err("scan", path, source))
}

fn io_err(action: &'static str, path: &Path, source: std::io::Error) -> crate::error::Error {
    crate::error::Error::Io { action, path: path.to_path_buf(), source }
}

#[cfg(test)]
mod maintenance_test {
    use super::*;
    use bob_audit::{BuildHost, DependencyRefs, Meta};
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
    use bob_ident::{ArtifactId, BuildId, VariantId};

    fn record(recipe: &str, arch: &str) -> AuditRecord {
        let digest = CanonicalHasher::new(HashAlgorithm::Sha256).update(recipe).finish();
        let build_id = BuildId::new_static(digest.clone());
        let mut meta_env = std::collections::BTreeMap::new();
        meta_env.insert("ARCH".to_string(), arch.to_string());
        AuditRecord {
            artifact: ArtifactId::from(&build_id),
            variant_id: VariantId::from_digest(digest),
            build_id,
            result_hash: "deadbeef".to_string(),
            references: Vec::new(),
            env: Default::default(),
            meta_env,
            scms: Vec::new(),
            dependencies: DependencyRefs::default(),
            meta: Meta {
                recipe: recipe.to_string(),
                step: "build".to_string(),
                package: recipe.to_string(),
                bob_version: "1.4.0".to_string(),
                script_language: "bash".to_string(),
                jenkins: None,
            },
            build: BuildHost { host_name: "ci-1".to_string(), user_name: "bob".to_string(), os: None },
        }
    }

    #[test]
    fn find_filters_by_metaenv() {
        let records = vec![record("widget", "arm64"), record("gadget", "x86")];
        let expr = QueryExpr::parse(r#"metaEnv.ARCH == "arm64""#).unwrap();
        let matched = find(&records, &expr);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].meta.recipe, "widget");
    }

    #[test]
    fn select_for_clean_applies_order_and_limit() {
        let records = vec![record("a", "1"), record("b", "2"), record("c", "3")];
        let query = CleanQuery::parse(r#"meta.step == "build", LIMIT 2 ORDER BY meta.recipe DESC"#).unwrap();
        let matched = select_for_clean(&records, &query);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].meta.recipe, "c");
        assert_eq!(matched[1].meta.recipe, "b");
    }

    #[test]
    fn scan_finds_nothing_under_missing_root() {
        let missing = Path::new("/does/not/exist/bob-cache-test");
        assert!(scan(missing).unwrap().is_empty());
    }

    #[test]
    fn scan_walks_two_level_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ab").join("cd");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("abcdef-1.tgz"), b"data").unwrap();
        let found = scan(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
    }
}
