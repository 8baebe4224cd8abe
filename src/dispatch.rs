//! # Process Dispatcher
//!
//! Runs suite files in separate worker processes, at most `max_workers` at a
//! time. Each worker runs its file with the IPC reporter; the dispatcher
//! echoes the forwarded events through its own console reporter as they
//! arrive and folds every worker's outcome into one batch total.
//!
//! Dispatch Invariant: each finished worker is recorded exactly once, and the
//! grand total line is printed exactly once, after the pending list and the
//! pool are both empty.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::future::{FutureExt, LocalBoxFuture};
use futures_util::stream::{self, FuturesUnordered, LocalBoxStream, StreamExt};
use termcolor::{StandardStream, WriteColor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::{ContextNaming, DEFAULT_MAX_WORKERS};
use crate::errors::{DispatchError, HarnessError};
use crate::message::{Message, RunEvent, WorkerLine};
use crate::report::ConsoleReporter;

// ============================================================================
// WORKERS
// ============================================================================

/// A running suite file: its decoded output and its eventual exit code.
///
/// `exit` is awaited only after `lines` has ended.
pub struct Worker {
    pub lines: LocalBoxStream<'static, WorkerLine>,
    pub exit: LocalBoxFuture<'static, Option<i32>>,
}

/// Starts workers. The dispatcher never spawns processes directly.
pub trait Launcher {
    fn launch(&self, path: &Path) -> Result<Worker, DispatchError>;
}

/// Launches each suite file as a child process with `--reporter ipc`.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    naming: ContextNaming,
}

impl ProcessLauncher {
    pub fn new(naming: ContextNaming) -> Self {
        Self { naming }
    }

    fn worker_args(&self) -> [&'static str; 4] {
        ["--reporter", "ipc", "--naming", self.naming.as_arg()]
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, path: &Path) -> Result<Worker, DispatchError> {
        let mut child = Command::new(path)
            .args(self.worker_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DispatchError::Launch {
                path: path.to_path_buf(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| DispatchError::MissingPipe {
            path: path.to_path_buf(),
        })?;

        let reader = BufReader::new(stdout).lines();
        let lines = stream::unfold(reader, |mut reader| async move {
            match reader.next_line().await {
                Ok(Some(line)) => Some((line, reader)),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("failed to read worker output: {e}");
                    None
                }
            }
        })
        .flat_map(|line| stream::iter(WorkerLine::split(&line)))
        .boxed_local();

        let exit = async move {
            match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!("failed to wait for worker: {e}");
                    None
                }
            }
        }
        .boxed_local();

        Ok(Worker { lines, exit })
    }
}

// ============================================================================
// BATCH ACCOUNTING
// ============================================================================

/// Grand totals across every worker of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTotals {
    pub passed: u64,
    pub failed: u64,
}

impl BatchTotals {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// What one worker left behind.
#[derive(Debug)]
struct WorkerOutcome {
    file: PathBuf,
    final_event: Option<RunEvent>,
    exit_code: Option<i32>,
    launch_error: Option<DispatchError>,
}

impl WorkerOutcome {
    /// The worker's contribution to the batch, and a reason when the process
    /// itself failed.
    fn contribution(&self) -> (BatchTotals, Option<String>) {
        if let Some(e) = &self.launch_error {
            return (BatchTotals { passed: 0, failed: 1 }, Some(e.to_string()));
        }
        match &self.final_event {
            None => (
                BatchTotals { passed: 0, failed: 1 },
                Some(format!(
                    "worker exited ({}) without a final message",
                    describe_exit(self.exit_code)
                )),
            ),
            Some(event) => {
                let mut totals = BatchTotals {
                    passed: event.passed,
                    failed: event.rejected,
                };
                if event.success && self.exit_code != Some(0) {
                    totals.failed += 1;
                    return (
                        totals,
                        Some(format!(
                            "worker reported success but exited ({})",
                            describe_exit(self.exit_code)
                        )),
                    );
                }
                (totals, None)
            }
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code".to_string(),
    }
}

/// Accumulator owned by the dispatch loop.
#[derive(Debug, Default)]
struct Tally {
    totals: BatchTotals,
    recorded: usize,
    concluded: bool,
}

impl Tally {
    fn record(&mut self, contribution: BatchTotals) {
        self.totals.passed += contribution.passed;
        self.totals.failed += contribution.failed;
        self.recorded += 1;
    }

    /// Returns the totals the first time only.
    fn conclude(&mut self) -> Option<BatchTotals> {
        if self.concluded {
            return None;
        }
        self.concluded = true;
        Some(self.totals)
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

pub struct Dispatcher<L, W = StandardStream> {
    launcher: L,
    reporter: ConsoleReporter<W>,
    max_workers: usize,
}

impl<L: Launcher, W: WriteColor> Dispatcher<L, W> {
    pub fn new(launcher: L, reporter: ConsoleReporter<W>) -> Self {
        Self {
            launcher,
            reporter,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn into_parts(self) -> (L, ConsoleReporter<W>) {
        (self.launcher, self.reporter)
    }

    /// Runs the batch on a fresh current-thread runtime.
    pub fn run(&self, files: Vec<PathBuf>) -> Result<BatchTotals, HarnessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(HarnessError::Runtime)?;
        Ok(runtime.block_on(self.dispatch(files)))
    }

    /// Runs the batch on the caller's runtime and prints the grand total.
    pub async fn dispatch(&self, files: Vec<PathBuf>) -> BatchTotals {
        tracing::debug!(files = files.len(), max_workers = self.max_workers, "dispatching");
        let mut pending = files.into_iter();
        let mut pool = FuturesUnordered::new();
        let mut tally = Tally::default();

        loop {
            while pool.len() < self.max_workers {
                let Some(file) = pending.next() else { break };
                pool.push(self.supervise(file));
            }
            let Some(outcome) = pool.next().await else { break };

            let (contribution, reason) = outcome.contribution();
            if let Some(reason) = reason {
                self.reporter
                    .print_worker_failure(&outcome.file.display().to_string(), &reason);
            }
            tally.record(contribution);
            tracing::debug!(
                file = %outcome.file.display(),
                exit_code = ?outcome.exit_code,
                running = pool.len(),
                "worker finished"
            );
        }

        if let Some(totals) = tally.conclude() {
            tracing::debug!(workers = tally.recorded, "batch complete");
            self.reporter.print_totals(totals.passed, totals.failed);
        }
        tally.totals
    }

    /// Drives one worker to completion, echoing its events.
    async fn supervise(&self, file: PathBuf) -> WorkerOutcome {
        tracing::debug!(file = %file.display(), "launching worker");
        let Worker { mut lines, exit } = match self.launcher.launch(&file) {
            Ok(worker) => worker,
            Err(e) => {
                return WorkerOutcome {
                    file,
                    final_event: None,
                    exit_code: None,
                    launch_error: Some(e),
                }
            }
        };

        let mut final_event = None;
        while let Some(line) = lines.next().await {
            match line {
                WorkerLine::Message(Message::Test(event)) => self.reporter.print_test(&event),
                WorkerLine::Message(Message::Final(event)) => {
                    self.reporter.print_suite(&event);
                    final_event = Some(event);
                }
                WorkerLine::Text(text) => {
                    tracing::trace!(file = %file.display(), "passing through worker output");
                    self.reporter.print_passthrough(&text);
                }
            }
        }

        WorkerOutcome {
            file,
            final_event,
            exit_code: exit.await,
            launch_error: None,
        }
    }
}
