// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Checkout execution and its retry policy (spec.md §4.5 "SCM transient
//! failures are retried with backoff"). Grounded on the teacher's
//! `RetryIf`-based recovery of a transient mount-namespace read failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::{Condition, RetryIf};

use crate::error::{Error, Result};
use crate::types::StepKey;

/// One checkout attempt's resolved state: the SCM-type-specific string
/// recorded to the audit trail's `ScmRecord.resolved_state`, and whether
/// the checkout turned out to be indeterministic (its resolved state
/// cannot be predicted from the recipe alone, e.g. a floating branch).
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    pub resolved_state: String,
    pub indeterministic: bool,
}

/// Performs one package's checkout step. Implementations talk to the
/// concrete SCM (git clone/fetch, svn checkout, url download, ...); the
/// scheduler only depends on this trait so checkout backends stay
/// pluggable the same way cache backends do.
#[async_trait::async_trait]
pub trait ScmClient: Send + Sync {
    async fn checkout(&self, step: &StepKey, script: &str, work_dir: &std::path::Path) -> Result<CheckoutResult>;
}

/// Whether an error from a checkout attempt is the kind worth retrying
/// (transient network/permission failures), as opposed to a script bug
/// that would fail identically every time.
pub trait TransientClassifier: Send + Sync {
    fn is_transient(&self, error: &Error) -> bool;
}

/// The default classifier: only I/O errors are treated as transient. A
/// project wiring in a concrete SCM can supply a more specific
/// classifier recognizing that backend's own transient error shapes.
pub struct IoTransient;

impl TransientClassifier for IoTransient {
    fn is_transient(&self, error: &Error) -> bool {
        matches!(error, Error::Io { .. } | Error::ScmFailed { .. })
    }
}

struct RetryOnTransient<'a> {
    classifier: &'a dyn TransientClassifier,
    had_to_retry: Arc<AtomicBool>,
}

impl Condition<Error> for RetryOnTransient<'_> {
    fn should_retry(&mut self, error: &Error) -> bool {
        let transient = self.classifier.is_transient(error);
        if transient {
            self.had_to_retry.store(true, Ordering::Relaxed);
        }
        transient
    }
}

/// Runs `checkout` with up to 3 exponential-backoff retries (50ms base,
/// jittered) on transient failure, matching the teacher's own retry
/// budget for a similarly rare, self-healing condition.
pub async fn checkout_with_retry(
    client: &dyn ScmClient,
    classifier: &dyn TransientClassifier,
    step: &StepKey,
    script: &str,
    work_dir: &std::path::Path,
) -> Result<CheckoutResult> {
    let retry_strategy = ExponentialBackoff::from_millis(50).map(jitter).take(3);
    let had_to_retry = Arc::new(AtomicBool::new(false));

    let result = RetryIf::spawn(
        retry_strategy,
        || async { client.checkout(step, script, work_dir).await },
        RetryOnTransient { classifier, had_to_retry: Arc::clone(&had_to_retry) },
    )
    .await;

    if had_to_retry.load(Ordering::Relaxed) {
        tracing::warn!(step = %step, "checkout succeeded only after retrying a transient failure");
    }
    result
}
