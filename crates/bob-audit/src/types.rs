// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The audit record schema (spec.md §3 "Audit record", §6 "Audit trail").
//! Every field serde marks required MUST be present per spec.md §4.7;
//! fields added by a newer bob version are tolerated on read since this
//! struct is not `deny_unknown_fields` (forward compatibility).

use std::collections::BTreeMap;

use bob_ident::{ArtifactId, BuildId, VariantId};
use serde::{Deserialize, Serialize};

/// One SCM checkout's recorded state, as captured at `AuditWriting` time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScmRecord {
    pub scm_type: String,
    /// The canonicalized, SCM-type-specific state (a resolved commit
    /// hash for git, a revision number for svn, a digest for a url
    /// download, ...). Opaque to this crate.
    pub resolved_state: String,
    #[serde(default)]
    pub dir: Option<String>,
}

/// The transitive inputs a step consumed, by role (spec.md §3:
/// "nested dependency artifact-ids (by role: args, tools, sandbox)").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyRefs {
    #[serde(default)]
    pub args: Vec<ArtifactId>,
    #[serde(default)]
    pub tools: Vec<ArtifactId>,
    #[serde(default)]
    pub sandbox: Option<ArtifactId>,
}

impl DependencyRefs {
    /// Every artifact this step directly references, regardless of role.
    pub fn all(&self) -> impl Iterator<Item = &ArtifactId> {
        self.args.iter().chain(self.tools.iter()).chain(self.sandbox.iter())
    }
}

/// Optional Jenkins-mode provenance (spec.md §4.4/§6: "per-job name
/// derived from recipe name plus optional prefix").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsMeta {
    pub job_name: String,
    #[serde(default)]
    pub build_number: Option<u64>,
}

/// Identifying metadata about the step a record describes (spec.md §3:
/// "meta fields (recipe, step, package, bob version, scripting language,
/// optional Jenkins fields)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub recipe: String,
    pub step: String,
    pub package: String,
    pub bob_version: String,
    pub script_language: String,
    #[serde(default)]
    pub jenkins: Option<JenkinsMeta>,
}

/// The build host that produced this record (spec.md §3: "build host
/// data").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildHost {
    pub host_name: String,
    pub user_name: String,
    #[serde(default)]
    pub os: Option<String>,
}

/// One step's complete provenance record (spec.md §3, §4.7, §6). The
/// envelope stored on disk is this struct gzip-compressed as JSON; its
/// own `artifact` field plus the flattened `references` list (computed
/// by [`crate::recorder::build_references`]) together satisfy spec.md
/// §6's "top-level `{artifact, references[]}`".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub artifact: ArtifactId,
    pub variant_id: VariantId,
    pub build_id: BuildId,
    /// The checkout/build/package script's actual result hash, distinct
    /// from `build_id` when the step was indeterministic (spec.md §4.3).
    pub result_hash: String,
    #[serde(default)]
    pub references: Vec<ArtifactId>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub meta_env: BTreeMap<String, String>,
    #[serde(default)]
    pub scms: Vec<ScmRecord>,
    #[serde(default)]
    pub dependencies: DependencyRefs,
    pub meta: Meta,
    pub build: BuildHost,
}
