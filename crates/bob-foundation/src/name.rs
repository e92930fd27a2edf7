// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Validated name types used throughout the recipe loader and graph
//! instantiator: recipe/class names, tool names, variable names and
//! package paths (the `::`-joined ancestry of a package from its root).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid name {0:?}: must be non-empty and contain only [a-zA-Z0-9_.-]")]
    InvalidName(String),
    #[error("invalid package path {0:?}: segments must be valid recipe names joined by '::'")]
    InvalidPackagePath(String),
}

fn validate_segment(s: &str) -> Result<(), Error> {
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(Error::InvalidName(s.to_string()));
    }
    Ok(())
}

macro_rules! simple_name {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Construct a name known to already be valid, eg. one produced
            /// by a previous parse. Only intended for tests and macros.
            pub fn new_unchecked(s: impl Into<String>) -> Self {
                Self(s.into())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Error> {
                validate_segment(s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(s: &str) -> Result<Self, Error> {
                Self::from_str(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(s: String) -> Result<Self, Error> {
                validate_segment(&s)?;
                Ok(Self(s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::try_from(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

simple_name!(RecipeName, "The name of a recipe or class");
simple_name!(ToolName, "The exported name of a tool");
simple_name!(VarName, "The name of a consumed or provided variable");

/// The ancestry of a package from its declared root, e.g. `root::child::leaf`.
///
/// A package's identity is partly determined by this path: two packages
/// instantiated from the same recipe but reached via different dependency
/// chains are different packages (they may still share a `Variant-Id`).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackagePath(Vec<RecipeName>);

impl PackagePath {
    pub fn root(name: RecipeName) -> Self {
        Self(vec![name])
    }

    pub fn join(&self, name: RecipeName) -> Self {
        let mut segments = self.0.clone();
        segments.push(name);
        Self(segments)
    }

    pub fn leaf(&self) -> &RecipeName {
        self.0.last().expect("package path is never empty")
    }

    pub fn segments(&self) -> &[RecipeName] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The filesystem-safe relative path for this package, using `/`
    /// separators instead of `::` (used by the workspace manager).
    pub fn as_rel_path(&self) -> String {
        self.0
            .iter()
            .map(RecipeName::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(RecipeName::as_str)
            .collect::<Vec<_>>()
            .join("::");
        f.write_str(&rendered)
    }
}

impl FromStr for PackagePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::InvalidPackagePath(s.to_string()));
        }
        let segments = s
            .split("::")
            .map(RecipeName::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidPackagePath(s.to_string()))?;
        Ok(Self(segments))
    }
}

#[cfg(test)]
mod name_test {
    use super::*;

    #[test]
    fn valid_recipe_names_round_trip() {
        for raw in ["hello-world", "host.toolchain", "lib_foo"] {
            let name = RecipeName::from_str(raw).unwrap();
            assert_eq!(name.as_str(), raw);
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(RecipeName::from_str("").is_err());
    }

    #[test]
    fn invalid_characters_are_rejected() {
        assert!(RecipeName::from_str("foo/bar").is_err());
        assert!(RecipeName::from_str("foo bar").is_err());
    }

    #[test]
    fn package_path_joins_and_displays() {
        let root = PackagePath::root(RecipeName::from_str("root").unwrap());
        let child = root.join(RecipeName::from_str("child").unwrap());
        assert_eq!(child.to_string(), "root::child");
        assert_eq!(child.as_rel_path(), "root/child");
        assert_eq!(child.depth(), 2);
        assert_eq!(child.leaf().as_str(), "child");
    }
}
