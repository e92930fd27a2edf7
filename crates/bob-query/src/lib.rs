// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! String substitution & path/audit query engine (spec.md §4.8): the
//! shared services used by the recipe loader, the graph instantiator and
//! the artifact cache's maintenance API.

pub mod bobpaths;
pub mod queryexpr;
pub mod substitution;

pub use bobpaths::{glob_match, Axis, EmptyResultPolicy, PathExpr, PathQueryError};
pub use queryexpr::{CleanQuery, QueryExpr, QueryExprError, QueryValue, SortOrder};
pub use substitution::{SubstContext, SubstError, Template};
