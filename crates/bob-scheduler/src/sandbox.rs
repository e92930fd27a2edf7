// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Script execution, unsandboxed and namespace-isolated (spec.md §4.5
//! "Sandbox modes"). Grounded on the host-process execution pattern used
//! to run a build script against a prepared prefix, and on the mount
//! namespace primitives used to privatize and remount the filesystem
//! before running untrusted build steps.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::types::{ExecOutcome, SandboxMode};

/// Executes one step's script and reports exit status plus a log file.
/// `NullRunner` runs directly on the host; namespace-backed runners add
/// mount isolation in front of the same script invocation.
pub trait Runner: Send + Sync {
    fn run(&self, spec: &ScriptSpec) -> Result<ExecOutcome>;
}

/// Everything a runner needs to invoke a step's script: where it lives
/// on disk, what directory it runs from, and the environment it sees.
pub struct ScriptSpec {
    pub script: String,
    pub work_dir: PathBuf,
    pub log_path: PathBuf,
    pub env: BTreeMap<String, String>,
    pub sandbox: SandboxMode,
}

fn write_script_file(dir: &Path, body: &str) -> Result<PathBuf> {
    let path = dir.join("bob-step.sh");
    let mut writer = std::fs::File::create(&path).map_err(|source| Error::Io {
        action: "create",
        path: path.clone(),
        source,
    })?;
    writer.write_all(body.as_bytes()).map_err(|source| Error::Io {
        action: "write",
        path: path.clone(),
        source,
    })?;
    writer.sync_data().map_err(|source| Error::Io {
        action: "sync",
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn run_command(mut cmd: Command, spec: &ScriptSpec) -> Result<ExecOutcome> {
    let log = std::fs::File::create(&spec.log_path).map_err(|source| Error::Io {
        action: "create",
        path: spec.log_path.clone(),
        source,
    })?;
    let log_err = log.try_clone().map_err(|source| Error::Io {
        action: "clone handle for",
        path: spec.log_path.clone(),
        source,
    })?;
    cmd.stdout(log).stderr(log_err);

    let status = cmd.status().map_err(|source| Error::Io {
        action: "spawn",
        path: spec.work_dir.clone(),
        source,
    })?;

    let mut hasher = bob_foundation::digest::CanonicalHasher::new(
        bob_foundation::digest::HashAlgorithm::CURRENT,
    );
    hasher.update(spec.script.as_bytes());
    hasher.update(status.code().unwrap_or(-1).to_string().as_bytes());
    let result_hash = hasher.finish().to_hex();

    Ok(ExecOutcome { exit_code: status.code(), result_hash, log_path: spec.log_path.clone() })
}

/// Runs the step's script directly on the host, with no filesystem
/// isolation. Used for `SandboxMode::None`.
pub struct NullRunner;

impl Runner for NullRunner {
    fn run(&self, spec: &ScriptSpec) -> Result<ExecOutcome> {
        std::fs::create_dir_all(&spec.work_dir).map_err(|source| Error::Io {
            action: "create",
            path: spec.work_dir.clone(),
            source,
        })?;
        let script_path = write_script_file(&spec.work_dir, &spec.script)?;

        let mut cmd = Command::new("bash");
        cmd.arg("-ex").arg(&script_path);
        cmd.envs(spec.env.iter());
        cmd.current_dir(&spec.work_dir);
        run_command(cmd, spec)
    }
}

/// Runs the step's script inside a fresh mount namespace, remounting `/`
/// (and `/tmp` if mounted) as private before the script executes so that
/// bind mounts made for this step never escape to the host. Used for
/// `SandboxMode::{Partial, Slim, Dev, Strict}`; the modes differ in what
/// additional bind mounts the caller layers on top via `extra_mounts`.
pub struct NamespaceRunner {
    pub extra_mounts: Vec<(PathBuf, PathBuf)>,
}

impl NamespaceRunner {
    pub fn new(extra_mounts: Vec<(PathBuf, PathBuf)>) -> Self {
        Self { extra_mounts }
    }

    fn privatize_mounts(&self) -> Result<()> {
        use nix::mount::{mount, MsFlags};
        const NONE: Option<&str> = None;

        mount(NONE, "/", NONE, MsFlags::MS_PRIVATE, NONE)
            .map_err(|err| Error::Sandbox(format!("failed to privatize /: {err}")))?;
        if Path::new("/tmp").exists() {
            mount(NONE, "/tmp", NONE, MsFlags::MS_PRIVATE, NONE)
                .map_err(|err| Error::Sandbox(format!("failed to privatize /tmp: {err}")))?;
        }
        Ok(())
    }

    fn bind_extra_mounts(&self) -> Result<()> {
        use nix::mount::{mount, MsFlags};
        const NONE: Option<&str> = None;

        for (source, target) in &self.extra_mounts {
            mount(Some(source.as_path()), target.as_path(), NONE, MsFlags::MS_BIND, NONE)
                .map_err(|err| {
                    Error::Sandbox(format!("failed to bind {source:?} onto {target:?}: {err}"))
                })?;
        }
        Ok(())
    }
}

impl Runner for NamespaceRunner {
    fn run(&self, spec: &ScriptSpec) -> Result<ExecOutcome> {
        std::fs::create_dir_all(&spec.work_dir).map_err(|source| Error::Io {
            action: "create",
            path: spec.work_dir.clone(),
            source,
        })?;
        let script_path = write_script_file(&spec.work_dir, &spec.script)?;

        nix::sched::unshare(nix::sched::CloneFlags::CLONE_NEWNS)
            .map_err(|err| Error::Sandbox(format!("failed to enter mount namespace: {err}")))?;
        self.privatize_mounts()?;
        self.bind_extra_mounts()?;

        let mut cmd = Command::new("bash");
        cmd.arg("-ex").arg(&script_path);
        cmd.envs(spec.env.iter());
        cmd.current_dir(&spec.work_dir);
        run_command(cmd, spec)
    }
}

/// Picks the runner for a given sandbox mode. Modes other than `None`
/// currently all share the same namespace-isolation strategy; they are
/// expected to diverge in which `extra_mounts` the caller supplies (e.g.
/// `Dev` mounting a host toolchain, `Strict` mounting nothing beyond the
/// workspace itself).
pub fn runner_for(mode: SandboxMode, extra_mounts: Vec<(PathBuf, PathBuf)>) -> Box<dyn Runner> {
    match mode {
        SandboxMode::None => Box::new(NullRunner),
        _ => Box::new(NamespaceRunner::new(extra_mounts)),
    }
}
