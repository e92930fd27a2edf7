// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Top-level plumbing: wires the recipe loader, graph instantiator,
//! workspace manager, scheduler, cache and audit trail into a single
//! pipeline, aggregates every subsystem's error into one
//! `miette::Diagnostic`-friendly type, and exposes the Jenkins
//! translator contract (spec.md §6).

pub mod error;
pub mod jenkins;
pub mod pipeline;

pub use error::{Error, Result};
pub use jenkins::{diff_job_specs, CheckoutBinding, JenkinsTranslator, JobSpec, JobSpecDiff, Schedule};
pub use pipeline::{run, PipelineInputs};
