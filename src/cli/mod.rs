//! The Trial Command-Line Interface.
//!
//! Resolves the given paths into suite files and hands them to the
//! dispatcher.

use std::process::ExitCode;

use clap::Parser;

use crate::cli::args::TrialArgs;
use crate::discovery::SuiteDiscoverer;
use crate::dispatch::{Dispatcher, ProcessLauncher};
use crate::harness::init_tracing;
use crate::report::ConsoleReporter;

pub mod args;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    init_tracing();
    let args = TrialArgs::parse();

    match dispatch(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the batch described by `args`; `Ok(true)` when nothing failed.
fn dispatch(args: &TrialArgs) -> miette::Result<bool> {
    let config = args.config();
    let files = SuiteDiscoverer::resolve_inputs(&args.paths)?;
    tracing::debug!(files = files.len(), ?config, "resolved suite files");

    let launcher = ProcessLauncher::new(config.naming);
    let dispatcher = Dispatcher::new(launcher, ConsoleReporter::new(config.color.choice()))
        .with_max_workers(config.max_workers);
    let totals = dispatcher.run(files)?;
    Ok(totals.success())
}
