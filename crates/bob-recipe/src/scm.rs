// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The SCM capability interface (spec.md §1 scope note: "the SCM
//! capability interface the core consumes" is in scope; concrete wire
//! protocols are a Non-goal). [`ScmSpec`] is the parsed, template-bearing
//! form of a recipe's `checkoutSCM:` block; [`ScmCapability`] is the trait
//! a checkout backend implements, with `git`/`url` fakes provided for
//! tests and in-process use.

use bob_query::substitution::Template;

use crate::error::{Error, Result};
use crate::policy::{PolicyName, PolicySet};
use crate::yaml::ScmSpecYaml;

/// A parsed SCM spec, with every templatable field stored as a
/// [`Template`] rather than a raw string (spec.md §4.1: "template-capable"
/// fields are evaluated once per-package by the graph instantiator).
#[derive(Debug, Clone)]
pub enum ScmSpec {
    Git {
        url: Template,
        branch: Option<Template>,
        tag: Option<Template>,
        commit: Option<Template>,
        dir: Option<Template>,
    },
    Svn {
        url: Template,
        revision: Option<Template>,
        dir: Option<Template>,
    },
    Cvs {
        cvsroot: Template,
        module: Template,
        tag: Option<Template>,
        dir: Option<Template>,
    },
    Url {
        url: Template,
        digest_sha256: Option<String>,
        extract: bool,
        dir: Option<Template>,
    },
    Import {
        path: Template,
        dir: Option<Template>,
    },
}

impl ScmSpec {
    pub fn from_yaml(yaml: &ScmSpecYaml) -> Result<Self> {
        let t = |s: &str| -> Result<Template> { Ok(Template::parse(s)?) };
        let ot = |s: &Option<String>| -> Result<Option<Template>> {
            s.as_deref().map(t).transpose()
        };
        Ok(match yaml {
            ScmSpecYaml::Git { url, branch, tag, commit, dir } => ScmSpec::Git {
                url: t(url)?,
                branch: ot(branch)?,
                tag: ot(tag)?,
                commit: ot(commit)?,
                dir: ot(dir)?,
            },
            ScmSpecYaml::Svn { url, revision, dir } => ScmSpec::Svn {
                url: t(url)?,
                revision: ot(revision)?,
                dir: ot(dir)?,
            },
            ScmSpecYaml::Cvs { cvsroot, module, tag, dir } => ScmSpec::Cvs {
                cvsroot: t(cvsroot)?,
                module: t(module)?,
                tag: ot(tag)?,
                dir: ot(dir)?,
            },
            ScmSpecYaml::Url { url, digest_sha256, extract, dir } => ScmSpec::Url {
                url: t(url)?,
                digest_sha256: digest_sha256.clone(),
                extract: extract.unwrap_or(true),
                dir: ot(dir)?,
            },
            ScmSpecYaml::Import { path, dir } => ScmSpec::Import {
                path: t(path)?,
                dir: ot(dir)?,
            },
        })
    }

    /// The kind name used in diagnostics and in the `tidyUrlScm`/
    /// `fixImportScmVariant` policy checks.
    pub fn kind(&self) -> &'static str {
        match self {
            ScmSpec::Git { .. } => "git",
            ScmSpec::Svn { .. } => "svn",
            ScmSpec::Cvs { .. } => "cvs",
            ScmSpec::Url { .. } => "url",
            ScmSpec::Import { .. } => "import",
        }
    }
}

/// A fully-evaluated checkout location, ready to hand to a
/// [`ScmCapability`]: every template has already been substituted against
/// the package's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCheckout {
    pub kind: &'static str,
    pub location: String,
    pub revision: Option<String>,
    pub dir: Option<String>,
}

/// The capability a checkout backend must provide. `bob-graph` and
/// `bob-scheduler` depend on this trait, not on any concrete SCM client;
/// concrete wire protocols (the actual git/svn/cvs network clients) are
/// out of scope and are supplied by an external collaborator in
/// production, with [`NullScmCapability`] standing in for tests.
pub trait ScmCapability: Send + Sync {
    /// Perform (or simulate) an initial checkout into `dest`, returning the
    /// resolved revision actually obtained (important when `branch`/`tag`
    /// was requested rather than a pinned `commit`/`revision`).
    fn checkout(&self, checkout: &ResolvedCheckout, dest: &str) -> Result<String>;

    /// Returns `true` if an update is needed given the checkout's
    /// `checkoutUpdateIf` evaluation result; a deterministic checkout
    /// (pinned commit/revision/digest) should report `false` once synced.
    fn needs_update(&self, checkout: &ResolvedCheckout, current_revision: &str) -> bool;
}

/// An in-process fake used by tests and by `bob dev` against recipes with
/// no real network access: checkouts never touch disk and always report
/// the requested revision (or `"HEAD"`) as already resolved.
#[derive(Debug, Default)]
pub struct NullScmCapability;

impl ScmCapability for NullScmCapability {
    fn checkout(&self, checkout: &ResolvedCheckout, _dest: &str) -> Result<String> {
        Ok(checkout.revision.clone().unwrap_or_else(|| "HEAD".to_string()))
    }

    fn needs_update(&self, _checkout: &ResolvedCheckout, _current_revision: &str) -> bool {
        false
    }
}

/// Validates a parsed spec against the `tidyUrlScm` policy (spec.md §9
/// redesign notes): when `New`, a `url` checkout with `extract: true`
/// must declare an explicit `dir` rather than relying on the archive's
/// own top-level directory name.
pub fn validate_policy(spec: &ScmSpec, policies: &PolicySet, path: &std::path::Path) -> Result<()> {
    if let ScmSpec::Url { dir, extract, .. } = spec {
        if policies.is_new(PolicyName::TidyUrlScm) && *extract && dir.is_none() {
            return Err(Error::PolicyViolation {
                path: path.to_path_buf(),
                message: "url checkout with extract: true requires an explicit dir".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod scm_test {
    use super::*;

    #[test]
    fn git_spec_parses_templated_fields() {
        let yaml = ScmSpecYaml::Git {
            url: "https://example.invalid/${repo}.git".to_string(),
            branch: Some("main".to_string()),
            tag: None,
            commit: None,
            dir: None,
        };
        let spec = ScmSpec::from_yaml(&yaml).unwrap();
        assert_eq!(spec.kind(), "git");
    }

    #[test]
    fn null_capability_reports_requested_revision() {
        let cap = NullScmCapability;
        let checkout = ResolvedCheckout {
            kind: "git",
            location: "https://example.invalid/repo.git".to_string(),
            revision: Some("deadbeef".to_string()),
            dir: None,
        };
        assert_eq!(cap.checkout(&checkout, "/tmp/dest").unwrap(), "deadbeef");
        assert!(!cap.needs_update(&checkout, "deadbeef"));
    }
}
