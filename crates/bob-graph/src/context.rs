// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The per-package propagation context (spec.md §4.2 step 1): the
//! `(env, tools, sandbox, forwardedEnv, forwardedTools, forwardedSandbox)`
//! tuple threaded through the recursive instantiation walk, plus the
//! [`bob_query::SubstContext`] implementation used to evaluate template
//! fields and `if` predicates against it.

use std::collections::BTreeMap;

use bob_foundation::EnvMap;
use bob_query::{SubstContext, SubstError, Template};

use crate::types::{Sandbox, Tool};

/// The live propagation state for one recipe instantiation. `forwarded_*`
/// snapshots are handed unmodified to the first dependency and then
/// updated after each dependency that declares `forward: true` merges its
/// outputs back (spec.md §4.2 steps 3-4).
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub env: EnvMap,
    pub tools: Vec<Tool>,
    pub sandbox: Option<Sandbox>,
    pub forwarded_env: EnvMap,
    pub forwarded_tools: Vec<Tool>,
    pub forwarded_sandbox: Option<Sandbox>,
}

impl Context {
    /// A root context: `initial_env` filtered to the OS variable whitelist
    /// under the new `cleanEnvironment` policy (spec.md §4.2 step 1:
    /// "Root recipes get initial env minus non-whitelisted OS vars").
    pub fn root(initial_env: &EnvMap, clean_environment: bool) -> Self {
        let env = if clean_environment {
            initial_env.subset(OS_ENV_WHITELIST)
        } else {
            initial_env.clone()
        };
        Self {
            env: env.clone(),
            tools: Vec::new(),
            sandbox: None,
            forwarded_env: env,
            forwarded_tools: Vec::new(),
            forwarded_sandbox: None,
        }
    }

    /// The derived context passed into a dependency: starts from this
    /// recipe's forwarded snapshot, the sibling-order context for
    /// subsequent dependencies at the same level (spec.md §4.2 step 3).
    pub fn for_dependency(&self) -> Self {
        Self {
            env: self.forwarded_env.clone(),
            tools: self.forwarded_tools.clone(),
            sandbox: self.forwarded_sandbox.clone(),
            forwarded_env: self.forwarded_env.clone(),
            forwarded_tools: self.forwarded_tools.clone(),
            forwarded_sandbox: self.forwarded_sandbox.clone(),
        }
    }
}

/// Variables whitelisted through the new `cleanEnvironment` policy: the
/// minimum an interactive build step needs to locate its own toolchain and
/// write temporary files.
const OS_ENV_WHITELIST: &[&str] = &["PATH", "HOME", "USER", "TMPDIR", "LANG", "SHELL"];

/// Evaluates [`Template`]s and `if` predicates against a [`Context`]'s
/// current environment. Functions beyond plain variable lookup are not
/// part of this core's in-scope grammar surface (spec.md only specifies
/// the grammar, not a builtin function library) so `call_function` rejects
/// anything it's not explicitly told about; file-to-temp materialization
/// is likewise out of scope until a workspace exists to hold it.
pub struct EnvSubstContext<'a> {
    env: &'a EnvMap,
    defines: &'a BTreeMap<String, String>,
}

impl<'a> EnvSubstContext<'a> {
    pub fn new(env: &'a EnvMap, defines: &'a BTreeMap<String, String>) -> Self {
        Self { env, defines }
    }
}

impl SubstContext for EnvSubstContext<'_> {
    fn get_var(&self, name: &str) -> Option<String> {
        if let Some(value) = self.defines.get(name) {
            return Some(value.clone());
        }
        match self.env.get(name)? {
            bob_foundation::env::EnvValue::Set(v) => Some(v.clone()),
            bob_foundation::env::EnvValue::Unset => None,
        }
    }

    fn call_function(&mut self, name: &str, _args: &[String]) -> Result<String, SubstError> {
        Err(SubstError::UnknownFunction(name.to_string()))
    }

    fn file_to_temp(&mut self, expanded_path: &str, _reuse: bool) -> Result<String, SubstError> {
        Err(SubstError::TempFile(
            expanded_path.to_string(),
            "file-to-temp substitution requires a materialized workspace".to_string(),
        ))
    }
}

/// Evaluate `source` as a substitution template against `env`, returning
/// the substituted string. A plain (non-templated) string short-circuits
/// without invoking the parser.
pub fn substitute(
    source: &str,
    env: &EnvMap,
    defines: &BTreeMap<String, String>,
) -> Result<String, SubstError> {
    if !source.contains('$') {
        return Ok(source.to_string());
    }
    let template = Template::parse(source)?;
    let mut ctx = EnvSubstContext::new(env, defines);
    template.eval(&mut ctx)
}

/// Evaluate an `if:` predicate string, honoring spec.md §4.1's boolean
/// context rule (`""`/`"0"`/`"false"` case-insensitive are false).
pub fn eval_if(
    predicate: Option<&str>,
    env: &EnvMap,
    defines: &BTreeMap<String, String>,
) -> Result<bool, SubstError> {
    let Some(predicate) = predicate else { return Ok(true) };
    let evaluated = substitute(predicate, env, defines)?;
    Ok(bob_foundation::is_truthy(&evaluated))
}

#[cfg(test)]
mod context_test {
    use super::*;

    #[test]
    fn root_context_filters_to_whitelist_under_clean_environment() {
        let mut initial = EnvMap::new();
        initial.set("PATH", "/usr/bin").set("SECRET_TOKEN", "xyz");
        let ctx = Context::root(&initial, true);
        assert!(ctx.env.get("PATH").is_some());
        assert!(ctx.env.get("SECRET_TOKEN").is_none());
    }

    #[test]
    fn root_context_keeps_everything_when_not_cleaned() {
        let mut initial = EnvMap::new();
        initial.set("CUSTOM", "1");
        let ctx = Context::root(&initial, false);
        assert!(ctx.env.get("CUSTOM").is_some());
    }

    #[test]
    fn substitute_expands_variable_reference() {
        let mut env = EnvMap::new();
        env.set("NAME", "widget");
        let defines = BTreeMap::new();
        let result = substitute("pkg-${NAME}", &env, &defines).unwrap();
        assert_eq!(result, "pkg-widget");
    }

    #[test]
    fn eval_if_treats_false_like_strings_as_false() {
        let env = EnvMap::new();
        let defines = BTreeMap::new();
        assert!(!eval_if(Some("false"), &env, &defines).unwrap());
        assert!(!eval_if(Some("0"), &env, &defines).unwrap());
        assert!(eval_if(None, &env, &defines).unwrap());
    }

    #[test]
    fn unset_default_branch_is_not_evaluated_when_var_present() {
        let mut env = EnvMap::new();
        env.set("X", "present");
        let defines = BTreeMap::new();
        // The default branch references an unknown variable; since X is
        // set, it must never be evaluated (spec.md: "unused default/alt
        // expressions MUST be skipped, not evaluated").
        let result = substitute("${X:-${MISSING}}", &env, &defines).unwrap();
        assert_eq!(result, "present");
    }
}
