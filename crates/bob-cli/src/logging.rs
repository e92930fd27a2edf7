// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

//! Command line flags for configuring logging, grounded on the teacher's
//! `spfs_cli_common::Logging` (`-v`/`-vv`, an env var fallback, a subscriber
//! installed once at startup) but without its sentry/syslog integrations,
//! which have no counterpart here.

const BOB_LOG: &str = "BOB_LOG";

/// Command line flags for configuring logging and output (spec.md §6
/// ambient stack: `-v`/`-vv`/`BOB_LOG`, `--json-logs` for the Jenkins
/// translator's machine consumers).
#[derive(Debug, Clone, clap::Args)]
pub struct Logging {
    /// Make output more verbose, can be specified more than once
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit structured JSON log lines instead of human-readable text
    #[clap(long, global = true)]
    pub json_logs: bool,
}

impl Logging {
    fn filter(&self) -> String {
        if let Ok(explicit) = std::env::var(BOB_LOG) {
            return explicit;
        }
        match self.verbose {
            0 => "bob=info,warn".to_string(),
            1 => "bob=debug,info".to_string(),
            2 => "bob=trace,info".to_string(),
            _ => "trace".to_string(),
        }
    }

    /// Installs the process-wide `tracing` subscriber. Must be called
    /// exactly once, before any other subsystem emits a span.
    pub fn configure(&self) {
        let env_filter = tracing_subscriber::EnvFilter::new(self.filter());
        let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
        if self.json_logs {
            subscriber.json().init();
        } else {
            subscriber.init();
        }
    }
}
