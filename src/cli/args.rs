//! Defines the command-line arguments for the `trial` dispatcher.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ColorMode, Config, ContextNaming, DEFAULT_MAX_WORKERS};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "trial",
    version,
    about = "Runs suite executables in parallel worker processes and aggregates their results."
)]
pub struct TrialArgs {
    /// Suite executables, or directories to scan for `suite*` executables.
    pub paths: Vec<PathBuf>,

    /// Maximum number of workers running at once.
    #[arg(short, long, env = "TRIAL_JOBS", default_value_t = DEFAULT_MAX_WORKERS)]
    pub jobs: usize,

    /// When to color console output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// How workers name nested suites.
    #[arg(long, value_enum, default_value_t = ContextNaming::RootAncestor)]
    pub naming: ContextNaming,
}

impl TrialArgs {
    pub fn config(&self) -> Config {
        Config {
            color: self.color,
            naming: self.naming,
            ..Config::default()
        }
        .with_max_workers(self.jobs)
    }
}
