// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! `bobpaths`: an XPath-like expression language over the package graph
//! (spec.md §4.8). A `PathExpr` only knows how to parse itself and walk a
//! generic [`PathNode`] tree; predicate text is handed back to the caller
//! (the graph instantiator, which has the package/env/function-library
//! context predicates need) rather than evaluated here.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathQueryError {
    #[error("empty path expression")]
    Empty,
    #[error("unterminated predicate starting at {0:?}")]
    UnterminatedPredicate(String),
    #[error("unknown axis {0:?}")]
    UnknownAxis(String),
}

/// Traversal axes supported by a path step (spec.md §4.8).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Axis {
    SelfAxis,
    Child,
    DirectChild,
    Descendant,
    DirectDescendant,
    DescendantOrSelf,
    DirectDescendantOrSelf,
}

impl Axis {
    fn keyword(self) -> &'static str {
        match self {
            Axis::SelfAxis => "self",
            Axis::Child => "child",
            Axis::DirectChild => "direct-child",
            Axis::Descendant => "descendant",
            Axis::DirectDescendant => "direct-descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::DirectDescendantOrSelf => "direct-descendant-or-self",
        }
    }

    fn from_keyword(s: &str) -> Option<Axis> {
        Some(match s {
            "self" => Axis::SelfAxis,
            "child" => Axis::Child,
            "direct-child" => Axis::DirectChild,
            "descendant" => Axis::Descendant,
            "direct-descendant" => Axis::DirectDescendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "direct-descendant-or-self" => Axis::DirectDescendantOrSelf,
            _ => return None,
        })
    }
}

/// What a query resolving to zero nodes should do (spec.md §4.8).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EmptyResultPolicy {
    /// Return an empty set silently.
    NullSet,
    /// Treat like shell globbing with `nullglob`: the expression
    /// disappears entirely from whatever list it was embedded in.
    NullGlob,
    /// Treat an empty result as an error.
    NullFail,
}

/// A name test against a single path segment: an exact literal or a
/// `*`-glob.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NameTest {
    Any,
    Literal(String),
    Glob(String),
}

impl NameTest {
    fn parse(s: &str) -> NameTest {
        if s == "*" {
            NameTest::Any
        } else if s.contains('*') {
            NameTest::Glob(s.to_string())
        } else {
            NameTest::Literal(s.to_string())
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Literal(s) => s == candidate,
            NameTest::Glob(pattern) => glob_match(pattern, candidate),
        }
    }
}

pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn inner(pat: &[u8], cand: &[u8]) -> bool {
        match (pat.first(), cand.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pat[1..], cand) || (!cand.is_empty() && inner(pat, &cand[1..]))
            }
            (Some(p), Some(c)) if p == c => inner(&pat[1..], &cand[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), candidate.as_bytes())
}

/// One step of a parsed path expression.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub name_test: NameTest,
    pub predicates: Vec<String>,
}

/// A fully parsed `bobpaths` expression.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PathExpr {
    pub steps: Vec<Step>,
    pub empty_result_policy: EmptyResultPolicy,
}

impl PathExpr {
    /// Parse a path expression. Steps are separated by `/`; a leading `//`
    /// (or a `/` directly following another `/`) selects the
    /// `descendant`/`descendant-or-self` axis for the following step's
    /// name test. A step may be written with an explicit `axis::name` to
    /// select any of the other axes. Predicates are `[...]` suffixes,
    /// possibly repeated (each one ANDed with the others).
    pub fn parse(input: &str) -> Result<Self, PathQueryError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PathQueryError::Empty);
        }

        let mut steps = Vec::new();
        let mut descendant_pending = trimmed.starts_with("//");
        let raw = trimmed.trim_start_matches('/');
        for raw_step in split_top_level(raw, '/') {
            if raw_step.is_empty() {
                // A doubled separator marks the *next* step as a
                // descendant step; nothing to record for this empty slot.
                descendant_pending = true;
                continue;
            }
            let (head, predicates) = split_predicates(raw_step)?;
            let (axis, name) = if head == "." {
                (Axis::SelfAxis, "*".to_string())
            } else if let Some((axis_kw, rest)) = head.split_once("::") {
                let axis = Axis::from_keyword(axis_kw)
                    .ok_or_else(|| PathQueryError::UnknownAxis(axis_kw.to_string()))?;
                (axis, rest.to_string())
            } else if descendant_pending {
                (Axis::Descendant, head.to_string())
            } else {
                (Axis::Child, head.to_string())
            };
            descendant_pending = false;
            steps.push(Step {
                axis,
                name_test: NameTest::parse(&name),
                predicates,
            });
        }

        Ok(PathExpr {
            steps,
            empty_result_policy: EmptyResultPolicy::NullSet,
        })
    }

    pub fn with_empty_result_policy(mut self, policy: EmptyResultPolicy) -> Self {
        self.empty_result_policy = policy;
        self
    }

    /// Evaluate this expression against one or more root nodes.
    /// `check_predicate` is called once per candidate node per predicate
    /// string and should evaluate that predicate's substitution expression
    /// in whatever context the caller maintains.
    pub fn evaluate<'a, N: PathNode>(
        &self,
        roots: &[&'a N],
        mut check_predicate: impl FnMut(&N, &str) -> Result<bool, PathQueryError>,
    ) -> Result<Vec<&'a N>, PathQueryError> {
        let mut current: Vec<&'a N> = roots.to_vec();
        for step in &self.steps {
            let mut next = Vec::new();
            for node in &current {
                for candidate in collect_axis(node, step.axis) {
                    if !step.name_test.matches(candidate.name()) {
                        continue;
                    }
                    let mut ok = true;
                    for predicate in &step.predicates {
                        if !check_predicate(candidate, predicate)? {
                            ok = false;
                            break;
                        }
                    }
                    if ok {
                        next.push(candidate);
                    }
                }
            }
            current = next;
        }

        if current.is_empty() && self.empty_result_policy == EmptyResultPolicy::NullFail {
            return Err(PathQueryError::UnterminatedPredicate(
                "query matched no nodes".to_string(),
            ));
        }
        Ok(current)
    }
}

/// A node in the tree a [`PathExpr`] is evaluated over (the package graph,
/// in production use).
pub trait PathNode {
    fn name(&self) -> &str;
    fn children<'a>(&'a self) -> Vec<&'a Self>;
}

fn collect_axis<'a, N: PathNode>(node: &'a N, axis: Axis) -> Vec<&'a N> {
    match axis {
        Axis::SelfAxis => vec![node],
        Axis::Child | Axis::DirectChild => node.children(),
        Axis::DescendantOrSelf | Axis::DirectDescendantOrSelf => {
            let mut out = vec![node];
            for child in node.children() {
                out.extend(collect_axis(child, axis));
            }
            out
        }
        Axis::Descendant | Axis::DirectDescendant => {
            let mut out = Vec::new();
            for child in node.children() {
                out.push(child);
                out.extend(collect_axis(child, axis));
            }
            out
        }
    }
}

/// Split `s` on `sep`, but never inside a `[...]` predicate bracket.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Split a single step into its head (axis+name) and its list of predicate
/// expression strings.
fn split_predicates(step: &str) -> Result<(&str, Vec<String>), PathQueryError> {
    let Some(bracket_pos) = step.find('[') else {
        return Ok((step, Vec::new()));
    };
    let head = &step[..bracket_pos];
    let mut predicates = Vec::new();
    let mut rest = &step[bracket_pos..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let mut depth = 1i32;
        let mut end = None;
        for (i, c) in stripped.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(end) = end else {
            return Err(PathQueryError::UnterminatedPredicate(step.to_string()));
        };
        predicates.push(stripped[..end].to_string());
        rest = &stripped[end + 1..];
    }
    Ok((head, predicates))
}

#[cfg(test)]
mod bobpaths_test {
    use super::*;

    struct Tree {
        name: String,
        children: Vec<Tree>,
    }

    impl PathNode for Tree {
        fn name(&self) -> &str {
            &self.name
        }

        fn children<'a>(&'a self) -> Vec<&'a Self> {
            self.children.iter().collect()
        }
    }

    fn sample() -> Tree {
        Tree {
            name: "root".into(),
            children: vec![
                Tree {
                    name: "toolchain".into(),
                    children: vec![Tree { name: "gcc".into(), children: vec![] }],
                },
                Tree { name: "libfoo".into(), children: vec![] },
            ],
        }
    }

    fn no_predicates(_: &Tree, _: &str) -> Result<bool, PathQueryError> {
        Ok(true)
    }

    #[test]
    fn child_axis_selects_direct_children() {
        let root = sample();
        let expr = PathExpr::parse("*").unwrap();
        let result = expr.evaluate(&[&root], no_predicates).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn literal_name_test_matches_exactly() {
        let root = sample();
        let expr = PathExpr::parse("libfoo").unwrap();
        let result = expr.evaluate(&[&root], no_predicates).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name(), "libfoo");
    }

    #[test]
    fn glob_name_test() {
        let root = sample();
        let expr = PathExpr::parse("tool*").unwrap();
        let result = expr.evaluate(&[&root], no_predicates).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn descendant_axis_reaches_grandchildren() {
        let root = sample();
        let expr = PathExpr::parse("//gcc").unwrap();
        let result = expr.evaluate(&[&root], no_predicates).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name(), "gcc");
    }

    #[test]
    fn explicit_axis_syntax() {
        let root = sample();
        let expr = PathExpr::parse("descendant-or-self::gcc").unwrap();
        let result = expr.evaluate(&[&root], no_predicates).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn nullfail_policy_errors_on_empty_result() {
        let root = sample();
        let expr = PathExpr::parse("nonexistent").unwrap().with_empty_result_policy(EmptyResultPolicy::NullFail);
        assert!(expr.evaluate(&[&root], no_predicates).is_err());
    }

    #[test]
    fn nullset_policy_returns_empty_vec() {
        let root = sample();
        let expr = PathExpr::parse("nonexistent").unwrap();
        assert!(expr.evaluate(&[&root], no_predicates).unwrap().is_empty());
    }

    #[test]
    fn predicate_filters_candidates() {
        let root = sample();
        let expr = PathExpr::parse("*[is-gcc]").unwrap();
        let result = expr
            .evaluate(&[&root], |node, pred| Ok(pred == "is-gcc" && node.name() == "toolchain"))
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name(), "toolchain");
    }
}
