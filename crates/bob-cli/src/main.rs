// Copyright (c) Bob contributors.
// SPDX-License-Identifier: Apache-2.0

mod cache_args;
mod cli;
mod commands;
mod context;
mod error;
mod logging;
mod shell_scm;

use clap::Parser;

fn main() -> miette::Result<()> {
    std::process::exit(main2()?);
}

fn main2() -> miette::Result<i32> {
    let opt = cli::Opt::parse();
    opt.logging.configure();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| miette::miette!("failed to start async runtime: {err}"))?;

    match rt.block_on(opt.run()) {
        Ok(code) => Ok(code),
        Err(err) => {
            tracing::error!("{err:?}");
            Err(err.into())
        }
    }
}
