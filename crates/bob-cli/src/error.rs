// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] bob_core::Error),

    #[error("invalid package path {0:?}")]
    InvalidPath(String),

    #[error(transparent)]
    Query(#[from] bob_query::PathQueryError),

    #[error(transparent)]
    QueryExpr(#[from] bob_query::QueryExprError),

    #[error("no recipe named {0:?}")]
    UnknownRecipe(String),

    #[error("package {0:?} not found in the instantiated graph")]
    UnknownPackage(String),

    #[error("no query results and --fail was given")]
    EmptyQuery,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
