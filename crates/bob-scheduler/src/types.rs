// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Scheduler-local types: the per-step identity the state machine is
//! keyed by, the state machine itself, sandbox modes, and build scope
//! (spec.md §4.5).

use std::fmt;

use bob_foundation::PackagePath;
use bob_graph::StepRole;

/// Identifies one step within the [`bob_graph::PackageGraph`] the
/// scheduler is driving. `PackagePath` plus `StepRole` is unique within a
/// graph (spec.md §3 invariant: "Every Step has exactly one role within
/// its package").
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StepKey {
    pub package: PackagePath,
    pub role: StepRole,
}

impl StepKey {
    pub fn new(package: PackagePath, role: StepRole) -> Self {
        Self { package, role }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            StepRole::Checkout => "checkout",
            StepRole::Build => "build",
            StepRole::Package => "package",
        };
        write!(f, "{}:{role}", self.package)
    }
}

/// The per-step lifecycle (spec.md §4.5 "Per-step lifecycle"). `Planned`
/// through `Cancelled` track a single run; a fresh [`crate::Scheduler`]
/// starts every step at `Pending` and re-derives further state on
/// [`crate::resume::resume_state`] when asked to resume a prior run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StepState {
    Pending,
    Planned,
    FetchingDeps,
    Downloading,
    Executing,
    AuditWriting,
    Complete,
    Failed,
    Cancelled,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Complete | StepState::Failed | StepState::Cancelled)
    }
}

/// Which steps of a package are in scope for the current run (spec.md
/// §4.5 "Build mode transitions disable some states").
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BuildScope {
    Full,
    CheckoutOnly,
    BuildOnly,
}

impl BuildScope {
    pub fn includes(self, role: StepRole) -> bool {
        match self {
            BuildScope::Full => true,
            BuildScope::CheckoutOnly => role == StepRole::Checkout,
            BuildScope::BuildOnly => role != StepRole::Checkout,
        }
    }
}

/// The ephemeral-root-filesystem isolation level a step executes under
/// (spec.md §4.5 "Sandbox modes").
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SandboxMode {
    None,
    Partial,
    Slim,
    Dev,
    Strict,
}

impl SandboxMode {
    /// Whether this mode requires an ephemeral mount namespace at all;
    /// `None` never isolates, `Partial` only does when a sandbox image is
    /// available (the caller decides that and passes the right mode in).
    pub fn requires_namespace(self) -> bool {
        !matches!(self, SandboxMode::None)
    }
}

/// The outcome of running one step's script (spec.md §4.5 "Executing ...
/// captures exit code and result-hash").
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    pub result_hash: String,
    pub log_path: std::path::PathBuf,
}
