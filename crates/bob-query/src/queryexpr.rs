// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The small boolean expression language used by the artifact cache's
//! maintenance API (spec.md §4.6: `find`/`clean`/`scan`) over audit-trail
//! keys (`meta.*`, `metaEnv.*`), plus the `clean`'s optional
//! `LIMIT n [ORDER BY key [ASC|DESC]]` suffix.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryExprError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("expected {0:?}, found {1:?}")]
    Expected(String, String),
    #[error("trailing input {0:?}")]
    TrailingInput(String),
    #[error("invalid LIMIT value {0:?}")]
    InvalidLimit(String),
}

/// One operand of a comparison: either a dotted key lookup (`meta.recipe`,
/// `metaEnv.ARCH`) or a string literal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum QueryValue {
    Lookup(String),
    Literal(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum QueryExpr {
    Eq(QueryValue, QueryValue),
    Ne(QueryValue, QueryValue),
    And(Box<QueryExpr>, Box<QueryExpr>),
    Or(Box<QueryExpr>, Box<QueryExpr>),
    Not(Box<QueryExpr>),
}

impl QueryExpr {
    pub fn parse(input: &str) -> Result<Self, QueryExprError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens: &tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(QueryExprError::TrailingInput(
                parser.tokens[parser.pos..].join(" "),
            ));
        }
        Ok(expr)
    }

    /// Evaluate against a key/value lookup function (the caller resolves
    /// `meta.*`/`metaEnv.*` keys against an audit record).
    pub fn eval(&self, lookup: &dyn Fn(&str) -> Option<String>) -> bool {
        match self {
            QueryExpr::Eq(a, b) => resolve(a, lookup) == resolve(b, lookup),
            QueryExpr::Ne(a, b) => resolve(a, lookup) != resolve(b, lookup),
            QueryExpr::And(a, b) => a.eval(lookup) && b.eval(lookup),
            QueryExpr::Or(a, b) => a.eval(lookup) || b.eval(lookup),
            QueryExpr::Not(a) => !a.eval(lookup),
        }
    }
}

fn resolve(value: &QueryValue, lookup: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    match value {
        QueryValue::Lookup(key) => lookup(key),
        QueryValue::Literal(s) => Some(s.clone()),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// The full `clean(expr [, LIMIT n [ORDER BY key [ASC|DESC]]])` argument,
/// as consumed by the cache maintenance API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanQuery {
    pub expr: QueryExpr,
    pub limit: Option<usize>,
    pub order_by: Option<(String, SortOrder)>,
}

impl CleanQuery {
    pub fn parse(input: &str) -> Result<Self, QueryExprError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens: &tokens, pos: 0 };
        let expr = parser.parse_or()?;

        let mut limit = None;
        let mut order_by = None;
        if parser.peek() == Some(&",".to_string()) {
            parser.pos += 1;
            parser.expect_keyword("LIMIT")?;
            let n = parser.next_token()?;
            limit = Some(n.parse::<usize>().map_err(|_| QueryExprError::InvalidLimit(n))?);
            if parser.peek_keyword("ORDER") {
                parser.pos += 1;
                parser.expect_keyword("BY")?;
                let key = parser.next_token()?;
                let order = if parser.peek_keyword("DESC") {
                    parser.pos += 1;
                    SortOrder::Desc
                } else {
                    if parser.peek_keyword("ASC") {
                        parser.pos += 1;
                    }
                    SortOrder::Asc
                };
                order_by = Some((key, order));
            }
        }

        if parser.pos != parser.tokens.len() {
            return Err(QueryExprError::TrailingInput(
                parser.tokens[parser.pos..].join(" "),
            ));
        }

        Ok(CleanQuery { expr, limit, order_by })
    }
}

// --- tokenizer -----------------------------------------------------------

fn tokenize(input: &str) -> Result<Vec<String>, QueryExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' | ')' | ',' => {
                tokens.push(c.to_string());
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut lit = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    lit.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(QueryExprError::UnexpectedEnd);
                }
                i += 1;
                tokens.push(format!("\"{lit}"));
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push("==".to_string());
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push("!=".to_string());
                i += 2;
            }
            '!' => {
                tokens.push("!".to_string());
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push("&&".to_string());
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push("||".to_string());
                i += 2;
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !"()!&|,=\"'".contains(chars[i])
                {
                    i += 1;
                }
                if i == start {
                    return Err(QueryExprError::UnexpectedToken(chars[i].to_string()));
                }
                tokens.push(chars[start..i].iter().collect());
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&String> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        self.peek().map(|t| t.eq_ignore_ascii_case(kw)).unwrap_or(false)
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), QueryExprError> {
        let token = self.next_token()?;
        if token.eq_ignore_ascii_case(kw) {
            Ok(())
        } else {
            Err(QueryExprError::Expected(kw.to_string(), token))
        }
    }

    fn next_token(&mut self) -> Result<String, QueryExprError> {
        let token = self.peek().cloned().ok_or(QueryExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_or(&mut self) -> Result<QueryExpr, QueryExprError> {
        let mut left = self.parse_and()?;
        while self.peek().map(String::as_str) == Some("||") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = QueryExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<QueryExpr, QueryExprError> {
        let mut left = self.parse_unary()?;
        while self.peek().map(String::as_str) == Some("&&") {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = QueryExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<QueryExpr, QueryExprError> {
        if self.peek().map(String::as_str) == Some("!") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(QueryExpr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<QueryExpr, QueryExprError> {
        if self.peek().map(String::as_str) == Some("(") {
            self.pos += 1;
            let inner = self.parse_or()?;
            let close = self.next_token()?;
            if close != ")" {
                return Err(QueryExprError::Expected(")".to_string(), close));
            }
            return Ok(inner);
        }

        let left = self.parse_value()?;
        let op = self.next_token()?;
        let right = self.parse_value()?;
        match op.as_str() {
            "==" => Ok(QueryExpr::Eq(left, right)),
            "!=" => Ok(QueryExpr::Ne(left, right)),
            other => Err(QueryExprError::Expected("== or !=".to_string(), other.to_string())),
        }
    }

    fn parse_value(&mut self) -> Result<QueryValue, QueryExprError> {
        let token = self.next_token()?;
        if let Some(lit) = token.strip_prefix('"') {
            Ok(QueryValue::Literal(lit.to_string()))
        } else {
            Ok(QueryValue::Lookup(token))
        }
    }
}

#[cfg(test)]
mod queryexpr_test {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |k: &str| pairs.iter().find(|(key, _)| *key == k).map(|(_, v)| v.to_string())
    }

    #[test]
    fn simple_equality() {
        let expr = QueryExpr::parse(r#"meta.recipe == "hello-world""#).unwrap();
        assert!(expr.eval(&lookup(&[("meta.recipe", "hello-world")])));
        assert!(!expr.eval(&lookup(&[("meta.recipe", "other")])));
    }

    #[test]
    fn and_or_not_precedence() {
        let expr = QueryExpr::parse(r#"meta.a == "1" && !(meta.b == "2") || meta.c == "3""#).unwrap();
        assert!(expr.eval(&lookup(&[("meta.a", "1"), ("meta.b", "x"), ("meta.c", "0")])));
        assert!(!expr.eval(&lookup(&[("meta.a", "0"), ("meta.b", "2"), ("meta.c", "0")])));
        assert!(expr.eval(&lookup(&[("meta.a", "0"), ("meta.b", "2"), ("meta.c", "3")])));
    }

    #[test]
    fn metaenv_lookup() {
        let expr = QueryExpr::parse(r#"metaEnv.ARCH != "x86""#).unwrap();
        assert!(expr.eval(&lookup(&[("metaEnv.ARCH", "arm64")])));
    }

    #[test]
    fn clean_query_with_limit_and_order() {
        let query = CleanQuery::parse(r#"meta.recipe == "x", LIMIT 10 ORDER BY meta.age DESC"#).unwrap();
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.order_by, Some(("meta.age".to_string(), SortOrder::Desc)));
    }

    #[test]
    fn clean_query_without_order_defaults_to_none() {
        let query = CleanQuery::parse(r#"meta.recipe == "x", LIMIT 5"#).unwrap();
        assert_eq!(query.limit, Some(5));
        assert!(query.order_by.is_none());
    }
}
