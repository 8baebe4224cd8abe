//! # Execution Scheduler
//!
//! Drains a [`Plan`] suite by suite on a single-threaded runtime.
//!
//! For one suite:
//! 1. `before` hooks fan out; any failure ends the suite.
//! 2. Each test in order: `before_each` fan-out, body, `after_each` fan-out.
//!    The pipeline passes or fails as a unit and never stops its siblings.
//! 3. `after` hooks fan out; a failure is reported but earlier passes stand.
//!
//! Fan-out starts every hook of the phase in order and waits for all of them
//! to settle, then rejects with the first failure in execution order. A
//! failing hook never cancels its siblings. Nothing times out: a body that
//! never resolves stalls the remainder of the run.

use std::time::Instant;

use futures_util::future::join_all;

use crate::errors::{Failure, HarnessError};
use crate::message::{Outcome, RunEvent, TestEvent};
use crate::registry::Plan;
use crate::report::Reporter;
use crate::suite::{Hook, HookKind, Suite, Test};
use crate::value::QuietPanics;

/// Lifecycle of one process's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Registering,
    Quiescing,
    Draining,
    Done,
}

/// Accumulated pass/fail counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub passed: u64,
    pub rejected: u64,
}

impl Totals {
    pub fn success(&self) -> bool {
        self.rejected == 0
    }
}

impl std::ops::AddAssign for Totals {
    fn add_assign(&mut self, other: Self) {
        self.passed += other.passed;
        self.rejected += other.rejected;
    }
}

pub struct Scheduler<R> {
    reporter: R,
    phase: Phase,
}

impl<R: Reporter> Scheduler<R> {
    pub fn new(reporter: R) -> Self {
        Self {
            reporter,
            phase: Phase::Registering,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Runs the plan to completion on a fresh current-thread runtime.
    pub fn execute(&mut self, plan: Plan) -> Result<Totals, HarnessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(HarnessError::Runtime)?;
        Ok(runtime.block_on(self.drain(plan)))
    }

    /// Drains the plan on the caller's runtime and emits the final event.
    ///
    /// Panics raised by bodies are reported as failures, not printed by the
    /// panic hook.
    pub async fn drain(&mut self, mut plan: Plan) -> Totals {
        let _quiet = QuietPanics::begin();
        self.transition(Phase::Quiescing);
        let start = Instant::now();
        let context = plan
            .contexts()
            .first()
            .map(|c| c.to_string())
            .unwrap_or_default();

        self.transition(Phase::Draining);
        tracing::debug!(suites = plan.len(), tests = plan.test_count(), "draining");
        let mut totals = Totals::default();
        while let Some(suite) = plan.pop_front() {
            totals += self.run_suite(suite).await;
        }

        self.reporter.run_finished(&RunEvent {
            context,
            success: totals.success(),
            passed: totals.passed,
            rejected: totals.rejected,
            duration: elapsed_ms(start),
        });
        self.transition(Phase::Done);
        tracing::debug!(passed = totals.passed, rejected = totals.rejected, "run complete");
        totals
    }

    fn transition(&mut self, next: Phase) {
        tracing::trace!(from = ?self.phase, to = ?next, "scheduler phase");
        self.phase = next;
    }

    async fn run_suite(&self, mut suite: Suite) -> Totals {
        tracing::trace!(context = %suite.context, "running suite");
        let mut totals = Totals::default();

        let start = Instant::now();
        if let Err(failure) = fan_out(&mut suite.before).await {
            self.report_hook_failure(&suite.context, HookKind::Before, start, &failure);
            totals.rejected += 1;
            return totals;
        }

        let tests = std::mem::take(&mut suite.tests);
        for mut test in tests {
            let start = Instant::now();
            let result = run_pipeline(&mut suite, &mut test).await;
            let outcome = match result {
                Ok(()) => {
                    totals.passed += 1;
                    Outcome::Passed
                }
                Err(failure) => {
                    totals.rejected += 1;
                    Outcome::Failed {
                        error: failure.to_string(),
                        stack: failure.stack(),
                    }
                }
            };
            self.reporter.test_finished(&TestEvent {
                context: suite.context.clone(),
                name: test.name,
                duration: elapsed_ms(start),
                outcome,
            });
        }

        let start = Instant::now();
        if let Err(failure) = fan_out(&mut suite.after).await {
            self.report_hook_failure(&suite.context, HookKind::After, start, &failure);
            totals.rejected += 1;
        }
        totals
    }

    fn report_hook_failure(
        &self,
        context: &str,
        kind: HookKind,
        start: Instant,
        failure: &Failure,
    ) {
        tracing::debug!(context, %kind, "suite hook failed");
        self.reporter.test_finished(&TestEvent {
            context: context.to_string(),
            name: format!("\"{}\" hook", kind),
            duration: elapsed_ms(start),
            outcome: Outcome::Failed {
                error: failure.to_string(),
                stack: failure.stack(),
            },
        });
    }
}

async fn run_pipeline(suite: &mut Suite, test: &mut Test) -> Result<(), Failure> {
    fan_out(&mut suite.before_each).await?;
    test.run().await?;
    fan_out(&mut suite.after_each).await
}

async fn fan_out(hooks: &mut [Hook]) -> Result<(), Failure> {
    if hooks.is_empty() {
        return Ok(());
    }
    let running: Vec<_> = hooks.iter_mut().map(Hook::run).collect();
    join_all(running).await.into_iter().collect()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
