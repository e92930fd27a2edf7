// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! The main orchestrator (spec.md §4.5): walks the package graph,
//! dependency-first, running each step through its lifecycle with a
//! bounded worker pool and cooperative cancellation. Grounded on the
//! teacher's `Syncer` — a per-object-graph recursive async walk with a
//! semaphore gating the expensive leaf work and `FuturesUnordered`
//! fanning out independent branches (`spfs::sync::Syncer::sync_platform`/
//! `sync_manifest`).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_recursion::async_recursion;
use bob_foundation::digest::Digest;
use bob_foundation::PackagePath;
use bob_graph::{Package, PackageGraph, Step, StepRole};
use bob_ident::BuildId;
use bob_recipe::policy::{PolicyName, PolicySet};
use bob_workspace::{WorkspaceArea, WorkspaceKey, WorkspaceManager};
use futures::stream::{FuturesUnordered, TryStreamExt};
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tracing::instrument;

use crate::archive;
use crate::error::{Error, Result};
use crate::fingerprint::{default_fingerprint, FingerprintCache};
use crate::resume::{self, AuditLayout};
use crate::sandbox::{self, ScriptSpec};
use crate::scm::{self, ScmClient, TransientClassifier};
use crate::types::{BuildScope, SandboxMode, StepKey, StepState};

/// Knobs for one `Scheduler::run` invocation (spec.md §4.5: build mode
/// transitions, parallelism, keep-going).
pub struct RunOptions {
    pub jobs: usize,
    pub keep_going: bool,
    pub scope: BuildScope,
    pub sandbox_mode: SandboxMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { jobs: 4, keep_going: false, scope: BuildScope::Full, sandbox_mode: SandboxMode::None }
    }
}

/// One step's final outcome, reported back up through the recursive walk
/// and collected into the run's overall report.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: StepKey,
    pub state: StepState,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub failed: bool,
}

type Memo = Mutex<BTreeMap<StepKey, Arc<OnceCell<BuildId>>>>;

pub struct Scheduler {
    graph: Arc<PackageGraph>,
    scm: Arc<dyn ScmClient>,
    classifier: Arc<dyn TransientClassifier>,
    cache: Arc<bob_cache::Cache>,
    workspace: Arc<Mutex<WorkspaceManager>>,
    audit_layout: Arc<AuditLayout>,
    fingerprints: Arc<FingerprintCache>,
    policies: PolicySet,
    semaphore: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    options: RunOptions,
    reports: Mutex<Vec<StepReport>>,
    memo: Memo,
}

impl Scheduler {
    pub fn new(
        graph: PackageGraph,
        scm: Arc<dyn ScmClient>,
        classifier: Arc<dyn TransientClassifier>,
        cache: Arc<bob_cache::Cache>,
        workspace: WorkspaceManager,
        audit_root: impl Into<PathBuf>,
        policies: PolicySet,
        options: RunOptions,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            scm,
            classifier,
            cache,
            workspace: Arc::new(Mutex::new(workspace)),
            audit_layout: Arc::new(AuditLayout::new(audit_root)),
            fingerprints: Arc::new(FingerprintCache::new()),
            policies,
            semaphore: Arc::new(Semaphore::new(options.jobs.max(1))),
            cancelled: Arc::new(AtomicBool::new(false)),
            reports: Mutex::new(Vec::new()),
            memo: Mutex::new(BTreeMap::new()),
            options,
        }
    }

    /// Signals every in-flight and not-yet-started step to stop, e.g. on
    /// SIGINT (spec.md §4.5 "cooperative cancellation").
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    fn fail_fast(&self, err: Error) -> Error {
        if !self.options.keep_going && !matches!(err, Error::Cancelled) {
            self.cancel();
        }
        err
    }

    /// Runs every root package's full pipeline, fanning roots out
    /// concurrently (they share no state but the semaphore and memo).
    pub async fn run(&self, roots: &[PackagePath]) -> Result<RunReport> {
        let mut futures = FuturesUnordered::new();
        for root in roots {
            futures.push(self.run_package(root.clone()));
        }
        let mut failed = false;
        loop {
            match futures.try_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => {
                    failed = true;
                    if !self.options.keep_going {
                        break;
                    }
                }
            }
        }
        Ok(RunReport { steps: self.reports.lock().await.clone(), failed })
    }

    /// Ensures `path`'s full step pipeline (checkout/build/package,
    /// scoped by [`BuildScope`]) has completed, recursing into its
    /// dependencies first. Memoized per package path so a package shared
    /// by multiple consumers only runs once per scheduler run.
    #[async_recursion]
    #[instrument(skip(self), fields(package = %path))]
    async fn run_package(&self, path: PackagePath) -> Result<BuildId> {
        let package = self.graph.get(&path).ok_or_else(|| {
            Error::Sandbox(format!("package {path} not found in graph"))
        })?.clone();

        let key = StepKey::new(path.clone(), StepRole::Package);
        let cell = {
            let mut memo = self.memo.lock().await;
            memo.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        cell.get_or_try_init(|| self.run_package_uncached(&package))
            .await
            .map(Clone::clone)
    }

    async fn run_package_uncached(&self, package: &Package) -> Result<BuildId> {
        self.check_cancelled()?;

        let mut deps = FuturesUnordered::new();
        for dep in &package.dependencies {
            deps.push(self.run_package(dep.package.clone()));
        }
        while let Some(result) = deps.try_next().await.map_err(|e| self.fail_fast(e))? {
            let _: BuildId = result;
        }

        if self.options.scope.includes(StepRole::Checkout) {
            self.run_step(package, &package.checkout, StepRole::Checkout).await.map_err(|e| self.fail_fast(e))?;
        }
        if self.options.scope.includes(StepRole::Build) {
            self.run_step(package, &package.build, StepRole::Build).await.map_err(|e| self.fail_fast(e))?;
        }
        let outcome = if self.options.scope.includes(StepRole::Package) {
            self.run_step(package, &package.package, StepRole::Package).await.map_err(|e| self.fail_fast(e))?
        } else {
            package
                .package
                .build_id
                .clone()
                .ok_or_else(|| Error::MissingBuildId { step: StepKey::new(package.path.clone(), StepRole::Package) })?
        };
        Ok(outcome)
    }

    fn workspace_area(role: StepRole) -> WorkspaceArea {
        match role {
            StepRole::Checkout => WorkspaceArea::Src,
            StepRole::Build => WorkspaceArea::Build,
            StepRole::Package => WorkspaceArea::Dist,
        }
    }

    async fn record_report(&self, step: StepKey, state: StepState) {
        self.reports.lock().await.push(StepReport { step, state });
    }

    /// Drives one step through its full lifecycle: resume check, cache
    /// probe, execution, audit write.
    #[instrument(skip(self, package, step), fields(role = ?role))]
    async fn run_step(&self, package: &Package, step: &Step, role: StepRole) -> Result<BuildId> {
        let key = StepKey::new(package.path.clone(), role);
        self.check_cancelled()?;

        let variant_id = step.variant_id.clone().ok_or_else(|| Error::MissingBuildId { step: key.clone() })?;
        let declared_build_id =
            step.build_id.clone().ok_or_else(|| Error::MissingBuildId { step: key.clone() })?;

        if !declared_build_id.is_dynamic() {
            if matches!(resume::resume_state(&self.audit_layout, &declared_build_id), StepState::Complete) {
                self.record_report(key, StepState::Complete).await;
                return Ok(declared_build_id);
            }
        }

        let workspace_key =
            WorkspaceKey { package: package.path.clone(), area: Self::workspace_area(role), variant_id };
        let work_dir = {
            let mut ws = self.workspace.lock().await;
            ws.acquire(&workspace_key)?.into_path_buf()
        };

        self.record_report(key.clone(), StepState::FetchingDeps).await;

        if !declared_build_id.is_dynamic() {
            self.record_report(key.clone(), StepState::Downloading).await;
            let expected_hash = declared_build_id.to_hex();
            if let Some(bundle) = self.cache.try_download(&declared_build_id, &expected_hash)? {
                archive::unpack_content(&bundle, &work_dir)?;
                self.write_audit_record(package, &key, step, &declared_build_id, &expected_hash).await?;
                self.record_report(key, StepState::Complete).await;
                return Ok(declared_build_id);
            }
        }

        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        self.check_cancelled()?;
        self.record_report(key.clone(), StepState::Executing).await;

        let final_build_id = if role == StepRole::Checkout {
            self.execute_checkout(&key, step, &work_dir, declared_build_id).await?
        } else {
            self.execute_script(&key, step, &work_dir, declared_build_id).await?
        };

        self.record_report(key.clone(), StepState::AuditWriting).await;
        let result_hash = final_build_id.to_hex();
        self.write_audit_record(package, &key, step, &final_build_id, &result_hash).await?;

        if self.cache.has_upload_backend() {
            let record_path = self.audit_layout.record_path(&final_build_id);
            let bundle = archive::pack(&work_dir, &record_path)?;
            let artifact_id = bob_ident::ArtifactId::from(&final_build_id);
            self.cache.upload(&artifact_id, &bundle)?;
        }

        let _fingerprint = self.fingerprints.get_or_compute(self.options.sandbox_mode, &key, || {
            Ok(default_fingerprint(package, &result_hash))
        })?;

        self.record_report(key, StepState::Complete).await;
        Ok(final_build_id)
    }

    async fn execute_checkout(
        &self,
        key: &StepKey,
        step: &Step,
        work_dir: &std::path::Path,
        declared: BuildId,
    ) -> Result<BuildId> {
        let checkout = scm::checkout_with_retry(
            self.scm.as_ref(),
            self.classifier.as_ref(),
            key,
            &step.script,
            work_dir,
        )
        .await?;

        let computed = Digest::from_hex(&checkout.resolved_state)
            .unwrap_or_else(|_| derive_digest_from_text(&checkout.resolved_state));

        if checkout.indeterministic {
            if let BuildId::Dynamic(expected) = &declared {
                if *expected != computed && self.policies.is_new(PolicyName::FailUnstableCheckouts) {
                    return Err(Error::UnstableCheckout {
                        step: key.clone(),
                        expected: declared.clone(),
                        actual: BuildId::new_dynamic(computed),
                    });
                }
            }
            return Ok(BuildId::new_dynamic(computed));
        }
        Ok(declared)
    }

    async fn execute_script(
        &self,
        key: &StepKey,
        step: &Step,
        work_dir: &std::path::Path,
        declared: BuildId,
    ) -> Result<BuildId> {
        let runner = sandbox::runner_for(self.options.sandbox_mode, Vec::new());
        let spec = ScriptSpec {
            script: step.script.clone(),
            work_dir: work_dir.to_path_buf(),
            log_path: work_dir.join("bob-step.log"),
            env: step.env.to_process_env(),
            sandbox: self.options.sandbox_mode,
        };
        let outcome = runner.run(&spec)?;
        match outcome.exit_code {
            Some(0) => Ok(declared),
            other => Err(Error::ScriptFailed { step: key.clone(), exit_code: other }),
        }
    }

    /// Writes this step's audit record with a real, validated transitive
    /// closure (spec.md §3 "the full audit trail for any artifact
    /// transitively includes all consumed dependency audit records",
    /// §4.7, §8): `dependencies` is built from the step's own resolved
    /// args/tools/sandbox, and `references` flattens each of those
    /// dependencies' already-written closures via
    /// [`bob_audit::build_references`].
    async fn write_audit_record(
        &self,
        package: &Package,
        key: &StepKey,
        step: &Step,
        build_id: &BuildId,
        result_hash: &str,
    ) -> Result<()> {
        let mut args = Vec::with_capacity(step.args.len());
        for dep_path in &step.args {
            if let Some(dep_build_id) = self.completed_package_build_id(dep_path).await {
                args.push(bob_ident::ArtifactId::from(&dep_build_id));
            }
        }
        let dependencies = bob_audit::DependencyRefs {
            args,
            tools: step.tools.iter().filter_map(|t| t.build_id.as_ref().map(bob_ident::ArtifactId::from)).collect(),
            sandbox: step.sandbox.as_ref().and_then(|s| s.build_id.as_ref()).map(bob_ident::ArtifactId::from),
        };
        let references = bob_audit::build_references(&dependencies, |artifact_id| {
            let dep_build_id = BuildId::new_static(artifact_id.digest().clone());
            bob_audit::read_record(&self.audit_layout.record_path(&dep_build_id)).ok()
        });

        let record = bob_audit::AuditRecord {
            artifact: bob_ident::ArtifactId::from(build_id),
            variant_id: bob_ident::VariantId::from_digest(build_id.digest().clone()),
            build_id: build_id.clone(),
            result_hash: result_hash.to_string(),
            references,
            env: step_env_for(package, key.role),
            meta_env: BTreeMap::new(),
            scms: Vec::new(),
            dependencies,
            meta: bob_audit::Meta {
                recipe: package.path.leaf().to_string(),
                step: role_name(key.role).to_string(),
                package: package.path.to_string(),
                bob_version: "1.4.0".to_string(),
                script_language: "bash".to_string(),
                jenkins: None,
            },
            build: bob_audit::BuildHost {
                host_name: hostname(),
                user_name: std::env::var("USER").unwrap_or_else(|_| "bob".to_string()),
                os: Some(std::env::consts::OS.to_string()),
            },
        };
        bob_audit::write_record(&self.audit_layout.record_path(build_id), &record)?;
        Ok(())
    }

    /// The Build-Id a dependency package's package step actually finished
    /// with this run, if it has run yet; otherwise its statically
    /// predicted Build-Id from graph instantiation.
    async fn completed_package_build_id(&self, path: &PackagePath) -> Option<BuildId> {
        let key = StepKey::new(path.clone(), StepRole::Package);
        let cell = self.memo.lock().await.get(&key).cloned();
        if let Some(id) = cell.and_then(|c| c.get().cloned()) {
            return Some(id);
        }
        self.graph.get(path).and_then(|pkg| pkg.package.build_id.clone())
    }
}

fn step_env_for(package: &Package, role: StepRole) -> BTreeMap<String, String> {
    match role {
        StepRole::Checkout => package.checkout.env.to_process_env(),
        StepRole::Build => package.build.env.to_process_env(),
        StepRole::Package => package.package.env.to_process_env(),
    }
}

fn role_name(role: StepRole) -> &'static str {
    match role {
        StepRole::Checkout => "checkout",
        StepRole::Build => "build",
        StepRole::Package => "package",
    }
}

fn derive_digest_from_text(text: &str) -> Digest {
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
    let mut hasher = CanonicalHasher::new(HashAlgorithm::CURRENT);
    hasher.update(text.as_bytes());
    hasher.finish()
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod scheduler_test {
    use super::*;
    use bob_cache::Cache;
    use bob_foundation::digest::{CanonicalHasher, HashAlgorithm};
    use bob_foundation::{EnvMap, RecipeName};
    use bob_ident::VariantId;
    use bob_workspace::BuildMode;
    use std::str::FromStr;

    struct FakeScm;

    #[async_trait::async_trait]
    impl ScmClient for FakeScm {
        async fn checkout(
            &self,
            _step: &StepKey,
            _script: &str,
            _work_dir: &std::path::Path,
        ) -> Result<scm::CheckoutResult> {
            Ok(scm::CheckoutResult { resolved_state: "deadbeef".to_string(), indeterministic: false })
        }
    }

    fn vid(seed: &str) -> VariantId {
        VariantId::from_digest(CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish())
    }

    fn bid(seed: &str) -> BuildId {
        BuildId::new_static(CanonicalHasher::new(HashAlgorithm::Sha256).update(seed).finish())
    }

    fn leaf_package(name: &str) -> Package {
        let path = PackagePath::root(RecipeName::from_str(name).unwrap());
        let mut checkout = Step::new(StepRole::Checkout, "true".to_string());
        checkout.variant_id = Some(vid(&format!("{name}-checkout")));
        checkout.build_id = Some(bid(&format!("{name}-checkout")));

        let mut build = Step::new(StepRole::Build, "true".to_string());
        build.variant_id = Some(vid(&format!("{name}-build")));
        build.build_id = Some(bid(&format!("{name}-build")));

        let mut package = Step::new(StepRole::Package, "true".to_string());
        package.variant_id = Some(vid(&format!("{name}-package")));
        package.build_id = Some(bid(&format!("{name}-package")));

        Package {
            path,
            env: EnvMap::new(),
            tools: Vec::new(),
            sandbox: None,
            dependencies: Vec::new(),
            checkout,
            build,
            package,
            relocatable: true,
            shared: false,
            fingerprint_script: None,
            fingerprint_vars: Vec::new(),
            provided_vars: BTreeMap::new(),
        }
    }

    fn scheduler_for(graph: PackageGraph, audit_dir: &std::path::Path, ws_dir: &std::path::Path) -> Scheduler {
        let workspace = WorkspaceManager::open(ws_dir, BuildMode::Dev).unwrap();
        Scheduler::new(
            graph,
            Arc::new(FakeScm),
            Arc::new(scm::IoTransient),
            Arc::new(Cache::new(Vec::new())),
            workspace,
            audit_dir,
            PolicySet::default(),
            RunOptions::default(),
        )
    }

    #[tokio::test]
    async fn runs_a_single_package_to_completion() {
        let audit_dir = tempfile::tempdir().unwrap();
        let ws_dir = tempfile::tempdir().unwrap();
        let package = leaf_package("widget");
        let root = package.path.clone();
        let mut graph = PackageGraph::default();
        graph.packages.insert(root.to_string(), package);
        graph.roots.push(root.clone());

        let scheduler = scheduler_for(graph, audit_dir.path(), ws_dir.path());
        let report = scheduler.run(&[root]).await.unwrap();

        assert!(!report.failed);
        assert!(report.steps.iter().any(|s| s.state == StepState::Complete));
    }

    #[tokio::test]
    async fn resume_skips_a_step_with_an_existing_audit_record() {
        let audit_dir = tempfile::tempdir().unwrap();
        let ws_dir = tempfile::tempdir().unwrap();
        let package = leaf_package("widget");
        let root = package.path.clone();
        let build_id = package.checkout.build_id.clone().unwrap();
        let mut graph = PackageGraph::default();
        graph.packages.insert(root.to_string(), package);
        graph.roots.push(root.clone());

        let scheduler = scheduler_for(graph, audit_dir.path(), ws_dir.path());
        // Pre-populate the audit trail as if a prior run already finished
        // the checkout step.
        let package = scheduler.graph.get(&root).unwrap();
        scheduler
            .write_audit_record(
                package,
                &StepKey::new(root.clone(), StepRole::Checkout),
                &package.checkout,
                &build_id,
                &build_id.to_hex(),
            )
            .await
            .unwrap();

        let report = scheduler.run(&[root]).await.unwrap();
        assert!(!report.failed);
    }
}
