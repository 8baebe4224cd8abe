//! Entry point for suite binaries.
//!
//! A suite binary's `main` hands its registrations to [`run_main`]:
//!
//! ```no_run
//! use trial::{expect, run_main};
//!
//! fn main() -> std::process::ExitCode {
//!     run_main(|r| {
//!         r.describe("math", |r| {
//!             r.it("adds", || expect(1 + 1).to_equal(2));
//!         });
//!     })
//! }
//! ```
//!
//! Run directly it prints to the console; the dispatcher runs it with
//! `--reporter ipc` and reads its events from stdout.

use std::process::ExitCode;
use std::sync::Once;

use clap::{Parser, ValueEnum};

use crate::config::{ColorMode, ContextNaming};
use crate::errors::HarnessError;
use crate::registry::{Plan, Registry};
use crate::report::{ConsoleReporter, IpcReporter, Reporter};
use crate::scheduler::{Scheduler, Totals};

static TRACING_INIT: Once = Once::new();

/// Installs a stderr `tracing` subscriber when `RUST_LOG` is set.
///
/// Safe to call more than once. Output never goes to stdout, which carries
/// the IPC stream in workers.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let _ = tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .try_init();
        }
    });
}

/// Where a suite binary sends its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReporterKind {
    #[default]
    Console,
    Ipc,
}

/// Command line understood by every suite binary.
#[derive(Debug, Parser)]
#[command(about = "Runs the suites registered in this binary.")]
pub struct HarnessArgs {
    /// Event sink: colored console output or JSON lines for a dispatcher.
    #[arg(long, value_enum, default_value_t = ReporterKind::Console)]
    pub reporter: ReporterKind,

    /// How nested suite names are composed.
    #[arg(long, value_enum, default_value_t = ContextNaming::RootAncestor)]
    pub naming: ContextNaming,

    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
}

/// Registers suites with `build`, runs them, and maps the result to an exit
/// status: success iff nothing was rejected.
pub fn run_main<F>(build: F) -> ExitCode
where
    F: FnOnce(&mut Registry),
{
    init_tracing();
    let args = HarnessArgs::parse();
    tracing::debug!(?args, "suite binary starting");

    let mut registry = Registry::with_naming(args.naming);
    build(&mut registry);
    let plan = registry.finish();

    let outcome = match args.reporter {
        ReporterKind::Console => run_plan(ConsoleReporter::new(args.color.choice()), plan),
        ReporterKind::Ipc => run_plan(IpcReporter::stdout(), plan),
    };

    match outcome {
        Ok(totals) if totals.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

/// Runs `plan` to completion with `reporter`.
pub fn run_plan<R: Reporter>(reporter: R, plan: Plan) -> Result<Totals, HarnessError> {
    Scheduler::new(reporter).execute(plan)
}
