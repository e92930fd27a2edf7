// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The graph instantiator (spec.md §4.2): walks the recipe registry
//! produced by `bob-recipe`, threads the propagation context through each
//! dependency, and emits the package/step DAG with identities computed by
//! `bob-ident`.

pub mod context;
pub mod error;
pub mod instantiate;
pub mod types;

pub use context::Context;
pub use error::{Error, Result};
pub use instantiate::{instantiate, step_inputs};
pub use types::{
    MountSpec, Package, PackageGraph, ResolvedDependency, Sandbox, Step, StepRole, Tool,
};
