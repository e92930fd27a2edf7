// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The Jenkins translator contract (spec.md §6 "Jenkins interface
//! (contract only)"): a data-only job specification plus the trait a
//! hypothetical XML-emitting backend would implement. This crate only
//! produces and diffs [`JobSpec`] values — never XML, never talks to a
//! Jenkins server.

use std::collections::BTreeMap;

/// One checkout SCM binding a Jenkins job needs wired into its
/// workspace before running its script.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CheckoutBinding {
    pub path: String,
    pub scm_type: String,
    pub resolved_state: String,
}

/// When/how a job is triggered (spec.md §6: "schedule/trigger
/// settings").
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Schedule {
    Manual,
    Cron(String),
    Upstream { job_name: String },
}

/// The abstract specification for one named Jenkins job (spec.md §6).
/// Two `JobSpec`s with equal fields are considered the same job for
/// `diff_job_specs` purposes, regardless of how a real emitter would
/// render them to XML.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JobSpec {
    pub job_name: String,
    pub node_expression: String,
    pub checkouts: Vec<CheckoutBinding>,
    pub schedule: Schedule,
    pub script: String,
    pub archive_globs: Vec<String>,
    pub parameters: BTreeMap<String, String>,
}

/// One field-level difference between a persisted `JobSpec` and the one
/// just computed from the current recipe graph (spec.md §6:
/// "Incremental updates compute a diff of the specification from
/// persisted state").
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JobSpecDiff {
    pub job_name: String,
    pub field: &'static str,
    pub previous: String,
    pub current: String,
}

/// Computes the field-level diff between two versions of the same job.
/// Returns an empty vec when `previous == current`.
pub fn diff_job_specs(previous: &JobSpec, current: &JobSpec) -> Vec<JobSpecDiff> {
    let mut diffs = Vec::new();
    let job_name = current.job_name.clone();

    macro_rules! field_diff {
        ($field:ident) => {
            if previous.$field != current.$field {
                diffs.push(JobSpecDiff {
                    job_name: job_name.clone(),
                    field: stringify!($field),
                    previous: format!("{:?}", previous.$field),
                    current: format!("{:?}", current.$field),
                });
            }
        };
    }

    field_diff!(node_expression);
    field_diff!(checkouts);
    field_diff!(schedule);
    field_diff!(script);
    field_diff!(archive_globs);
    field_diff!(parameters);

    diffs
}

/// The contract a hypothetical out-of-scope Jenkins XML emitter would
/// implement; the core depends only on this trait, never on a concrete
/// backend (spec.md §1 Non-goals: "Jenkins XML job emitter").
pub trait JenkinsTranslator: Send + Sync {
    /// Renders one job spec to whatever the backend's native format is
    /// (XML, a REST payload, ...). Opaque to the core.
    fn render(&self, spec: &JobSpec) -> String;
}

#[cfg(test)]
mod jenkins_test {
    use super::*;

    fn sample(script: &str) -> JobSpec {
        JobSpec {
            job_name: "widget".to_string(),
            node_expression: "linux".to_string(),
            checkouts: Vec::new(),
            schedule: Schedule::Manual,
            script: script.to_string(),
            archive_globs: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_specs_diff_to_nothing() {
        let spec = sample("echo hi");
        assert!(diff_job_specs(&spec, &spec).is_empty());
    }

    #[test]
    fn changed_script_is_reported() {
        let previous = sample("echo hi");
        let current = sample("echo bye");
        let diffs = diff_job_specs(&previous, &current);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].field, "script");
    }
}
