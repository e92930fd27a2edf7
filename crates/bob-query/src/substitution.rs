// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The recipe-field substitution grammar (spec.md §4.1, §4.8):
//!
//! - `${var}`, `${var:-default}`, `${var:+alt}` — unused `default`/`alt`
//!   branches MUST be skipped, not evaluated (they are still parsed so the
//!   grammar stays unambiguous, just never evaluated).
//! - `$(fn,arg,...)` — comma-separated call, backslash escape, and
//!   double-/single-quoted literal arguments.
//! - `$<<path>>` (file-to-temp with expanded name, cached by name),
//!   `$<'path'>` (an inlined literal string, never substituted further),
//!   `$<@path@>` (a fresh per-occurrence temp file).

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, recognize};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubstError {
    #[error("unterminated substitution expression starting at {0:?}")]
    Unterminated(String),
    #[error("unknown variable {0:?}")]
    UnknownVariable(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("function {0:?} called with wrong number of arguments")]
    WrongArity(String),
    #[error("failed to materialize temp file for {0:?}: {1}")]
    TempFile(String, String),
}

/// One parsed element of a substitution template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Var {
        name: String,
        /// `Some(Default(tokens))` for `:-`, `Some(Alt(tokens))` for `:+`.
        modifier: Option<VarModifier>,
    },
    Func {
        name: String,
        args: Vec<Vec<Token>>,
    },
    /// `$<<path>>`: expand `path`, then replace the whole expression with
    /// the path to a temp file holding that file's content. Calls with an
    /// identical expanded path reuse the same temp file.
    FileToTemp(Vec<Token>),
    /// `$<@path@>`: like `FileToTemp` but a fresh temp file is produced for
    /// every occurrence, even when the expanded path repeats.
    PerOccurrenceTemp(Vec<Token>),
    /// `$<'literal'>`: inlined verbatim, never substituted further.
    InlineLiteral(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarModifier {
    Default(Vec<Token>),
    Alt(Vec<Token>),
}

/// A parsed substitution template, ready to be evaluated against a
/// [`SubstContext`] any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(Vec<Token>);

impl Template {
    pub fn parse(input: &str) -> Result<Self, SubstError> {
        let (rest, tokens) =
            parse_tokens(input).map_err(|_| SubstError::Unterminated(input.to_string()))?;
        if !rest.is_empty() {
            return Err(SubstError::Unterminated(rest.to_string()));
        }
        Ok(Template(tokens))
    }

    pub fn eval(&self, ctx: &mut dyn SubstContext) -> Result<String, SubstError> {
        eval_tokens(&self.0, ctx)
    }
}

/// The evaluation-time collaborator for a [`Template`]: variable lookup,
/// built-in/plugin function dispatch and file-to-temp materialization.
pub trait SubstContext {
    fn get_var(&self, name: &str) -> Option<String>;

    /// Evaluate a built-in or plugin-registered function. `args` have
    /// already been recursively substituted (except single-quoted
    /// literals).
    fn call_function(&mut self, name: &str, args: &[String]) -> Result<String, SubstError>;

    /// Materialize `expanded_path`'s content as a temp file and return the
    /// temp file's path. When `reuse` is true, repeated calls with the same
    /// `expanded_path` MUST return the same temp path ($<<..>>`); when
    /// false a fresh temp file is produced every time (`$<@..@>`).
    fn file_to_temp(&mut self, expanded_path: &str, reuse: bool) -> Result<String, SubstError>;
}

fn eval_tokens(tokens: &[Token], ctx: &mut dyn SubstContext) -> Result<String, SubstError> {
    let mut out = String::new();
    for token in tokens {
        out.push_str(&eval_token(token, ctx)?);
    }
    Ok(out)
}

fn eval_token(token: &Token, ctx: &mut dyn SubstContext) -> Result<String, SubstError> {
    match token {
        Token::Literal(s) => Ok(s.clone()),
        Token::Var { name, modifier } => {
            let value = ctx.get_var(name);
            match (value, modifier) {
                (Some(v), Some(VarModifier::Alt(alt))) if crate::bool_truthy(&v) => {
                    eval_tokens(alt, ctx)
                }
                (Some(_), Some(VarModifier::Alt(_))) => Ok(String::new()),
                (Some(v), _) => Ok(v),
                (None, Some(VarModifier::Default(default))) => eval_tokens(default, ctx),
                (None, Some(VarModifier::Alt(_))) => Ok(String::new()),
                (None, None) => Err(SubstError::UnknownVariable(name.clone())),
            }
        }
        Token::Func { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval_tokens(arg, ctx)?);
            }
            ctx.call_function(name, &evaluated)
        }
        Token::FileToTemp(path) => {
            let expanded = eval_tokens(path, ctx)?;
            ctx.file_to_temp(&expanded, true)
        }
        Token::PerOccurrenceTemp(path) => {
            let expanded = eval_tokens(path, ctx)?;
            ctx.file_to_temp(&expanded, false)
        }
        Token::InlineLiteral(s) => Ok(s.clone()),
    }
}

// --- parsing -----------------------------------------------------------

fn parse_tokens(input: &str) -> IResult<&str, Vec<Token>> {
    many0(alt((parse_dollar_expr, parse_literal_run)))(input)
}

fn parse_literal_run(input: &str) -> IResult<&str, Token> {
    // Consume at least one non-'$' char; a lone, unmatched '$' is consumed
    // one character at a time by the final alternative below.
    alt((
        map(take_while1(|c| c != '$'), |s: &str| {
            Token::Literal(s.to_string())
        }),
        map(char('$'), |c| Token::Literal(c.to_string())),
    ))(input)
}

fn parse_dollar_expr(input: &str) -> IResult<&str, Token> {
    alt((
        parse_file_to_temp,
        parse_per_occurrence_temp,
        parse_inline_literal,
        parse_var_expr,
        parse_func_expr,
    ))(input)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

fn parse_name(input: &str) -> IResult<&str, &str> {
    take_while1(is_name_char)(input)
}

fn parse_var_expr(input: &str) -> IResult<&str, Token> {
    let (input, name) = preceded(tag("${"), parse_name)(input)?;
    let (input, modifier) = nom::combinator::opt(alt((
        map(preceded(tag(":-"), |i| parse_braced_tokens(i)), |tokens| {
            VarModifier::Default(tokens)
        }),
        map(preceded(tag(":+"), |i| parse_braced_tokens(i)), |tokens| {
            VarModifier::Alt(tokens)
        }),
    )))(input)?;
    let (input, _) = char('}')(input)?;
    Ok((
        input,
        Token::Var {
            name: name.to_string(),
            modifier,
        },
    ))
}

/// Parse tokens up to (but not including) the closing `}` of a `${...}`
/// expression, allowing nested `${}` / `$()` expressions within a
/// default/alt branch.
fn parse_braced_tokens(input: &str) -> IResult<&str, Vec<Token>> {
    many0(alt((
        parse_dollar_expr,
        map(take_while1(|c| c != '$' && c != '}'), |s: &str| {
            Token::Literal(s.to_string())
        }),
    )))(input)
}

fn parse_file_to_temp(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("$<<"), parse_angle_tokens, tag(">>")),
        Token::FileToTemp,
    )(input)
}

fn parse_per_occurrence_temp(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("$<@"), parse_angle_tokens, tag("@>")),
        Token::PerOccurrenceTemp,
    )(input)
}

fn parse_angle_tokens(input: &str) -> IResult<&str, Vec<Token>> {
    many0(alt((
        parse_dollar_expr,
        map(take_while1(|c| c != '$' && c != '>' && c != '@'), |s: &str| {
            Token::Literal(s.to_string())
        }),
    )))(input)
}

fn parse_inline_literal(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("$<'"), recognize(many0(nom::character::complete::none_of("'"))), tag("'>")),
        |s: &str| Token::InlineLiteral(s.to_string()),
    )(input)
}

fn parse_func_expr(input: &str) -> IResult<&str, Token> {
    let (input, _) = tag("$(")(input)?;
    let (input, name) = parse_name(input)?;
    let (input, args) = many0(preceded(char(','), parse_func_arg))(input)?;
    let (input, _) = char(')')(input)?;
    Ok((
        input,
        Token::Func {
            name: name.to_string(),
            args,
        },
    ))
}

/// Parse one comma-separated function argument: either a single- or
/// double-quoted literal/substitutable run, or a bare run of characters up
/// to the next `,`/`)` (honoring backslash escapes for those delimiters).
fn parse_func_arg(input: &str) -> IResult<&str, Vec<Token>> {
    alt((parse_single_quoted_arg, parse_double_quoted_arg, parse_bare_arg))(input)
}

fn parse_single_quoted_arg(input: &str) -> IResult<&str, Vec<Token>> {
    map(
        delimited(char('\''), recognize(many0(nom::character::complete::none_of("'"))), char('\'')),
        |s: &str| vec![Token::Literal(s.to_string())],
    )(input)
}

fn parse_double_quoted_arg(input: &str) -> IResult<&str, Vec<Token>> {
    let (input, _) = char('"')(input)?;
    let (input, tokens) = many0(alt((
        parse_dollar_expr,
        map(escaped_char, Token::Literal),
        map(take_while1(|c| c != '$' && c != '"' && c != '\\'), |s: &str| {
            Token::Literal(s.to_string())
        }),
    )))(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, tokens))
}

fn parse_bare_arg(input: &str) -> IResult<&str, Vec<Token>> {
    many0(alt((
        parse_dollar_expr,
        map(escaped_char, Token::Literal),
        map(take_while1(|c| c != '$' && c != ',' && c != ')' && c != '\\'), |s: &str| {
            Token::Literal(s.to_string())
        }),
    )))(input)
}

/// Parse a single backslash-escaped character and return it literally,
/// stripped of its escape. The backslash always escapes whatever follows
/// it, so this is used uniformly inside bare and double-quoted arguments.
fn escaped_char(input: &str) -> IResult<&str, String> {
    map(preceded(char('\\'), nom::character::complete::anychar), |c: char| {
        c.to_string()
    })(input)
}

pub(crate) fn bool_truthy(s: &str) -> bool {
    bob_foundation::is_truthy(s)
}

#[cfg(test)]
mod substitution_test {
    use super::*;
    use std::collections::BTreeMap;

    struct TestCtx {
        vars: BTreeMap<String, String>,
        temp_calls: Vec<(String, bool)>,
    }

    impl SubstContext for TestCtx {
        fn get_var(&self, name: &str) -> Option<String> {
            self.vars.get(name).cloned()
        }

        fn call_function(&mut self, name: &str, args: &[String]) -> Result<String, SubstError> {
            match name {
                "eq" => Ok((args[0] == args[1]).to_string()),
                "upper" => Ok(args[0].to_uppercase()),
                _ => Err(SubstError::UnknownFunction(name.to_string())),
            }
        }

        fn file_to_temp(&mut self, expanded_path: &str, reuse: bool) -> Result<String, SubstError> {
            self.temp_calls.push((expanded_path.to_string(), reuse));
            Ok(format!("/tmp/{expanded_path}-{}", self.temp_calls.len()))
        }
    }

    fn ctx(vars: &[(&str, &str)]) -> TestCtx {
        TestCtx {
            vars: vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            temp_calls: vec![],
        }
    }

    #[test]
    fn plain_variable_substitution() {
        let t = Template::parse("hello ${name}!").unwrap();
        assert_eq!(t.eval(&mut ctx(&[("name", "world")])).unwrap(), "hello world!");
    }

    #[test]
    fn missing_variable_without_default_errors() {
        let t = Template::parse("${missing}").unwrap();
        assert!(t.eval(&mut ctx(&[])).is_err());
    }

    #[test]
    fn default_used_only_when_var_is_unset() {
        let t = Template::parse("${name:-anon}").unwrap();
        assert_eq!(t.eval(&mut ctx(&[])).unwrap(), "anon");
        assert_eq!(t.eval(&mut ctx(&[("name", "bob")])).unwrap(), "bob");
    }

    #[test]
    fn unused_default_branch_is_never_evaluated() {
        // If the default branch were evaluated it would call an unknown
        // function and error; since `name` is set, it must be skipped.
        let t = Template::parse("${name:-$(boom)}").unwrap();
        assert_eq!(t.eval(&mut ctx(&[("name", "bob")])).unwrap(), "bob");
    }

    #[test]
    fn alt_used_only_when_var_is_truthy() {
        let t = Template::parse("${flag:+on}").unwrap();
        assert_eq!(t.eval(&mut ctx(&[("flag", "1")])).unwrap(), "on");
        assert_eq!(t.eval(&mut ctx(&[("flag", "0")])).unwrap(), "");
        assert_eq!(t.eval(&mut ctx(&[])).unwrap(), "");
    }

    #[test]
    fn function_call_with_args() {
        let t = Template::parse("$(eq,${a},${b})").unwrap();
        assert_eq!(t.eval(&mut ctx(&[("a", "x"), ("b", "x")])).unwrap(), "true");
        assert_eq!(t.eval(&mut ctx(&[("a", "x"), ("b", "y")])).unwrap(), "false");
    }

    #[test]
    fn single_quoted_arg_is_never_substituted() {
        let t = Template::parse("$(upper,'${literal dollar brace}')").unwrap();
        assert_eq!(
            t.eval(&mut ctx(&[])).unwrap(),
            "${LITERAL DOLLAR BRACE}"
        );
    }

    #[test]
    fn backslash_escapes_comma_and_paren() {
        let t = Template::parse(r"$(upper,a\,b\)c)").unwrap();
        assert_eq!(t.eval(&mut ctx(&[])).unwrap(), "A,B)C");
    }

    #[test]
    fn inline_literal_is_passed_through_untouched() {
        let t = Template::parse("$<'raw ${not substituted}'>").unwrap();
        assert_eq!(t.eval(&mut ctx(&[])).unwrap(), "raw ${not substituted}");
    }

    #[test]
    fn file_to_temp_reuses_temp_for_same_path() {
        let t = Template::parse("$<<src/${name}.txt>> $<<src/${name}.txt>>").unwrap();
        let mut c = ctx(&[("name", "a")]);
        let result = t.eval(&mut c).unwrap();
        let parts: Vec<&str> = result.split(' ').collect();
        assert_eq!(parts[0], parts[1], "identical expanded paths should be called identically");
    }

    #[test]
    fn per_occurrence_temp_is_called_once_per_use() {
        let t = Template::parse("$<@src/a.txt@> $<@src/a.txt@>").unwrap();
        let mut c = ctx(&[]);
        t.eval(&mut c).unwrap();
        assert_eq!(c.temp_calls.len(), 2);
        assert!(c.temp_calls.iter().all(|(_, reuse)| !*reuse));
    }

    #[test]
    fn lone_dollar_sign_is_literal() {
        let t = Template::parse("cost: $5").unwrap();
        assert_eq!(t.eval(&mut ctx(&[])).unwrap(), "cost: $5");
    }
}
