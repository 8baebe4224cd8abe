//! # Trial Test Helpers
//!
//! A reporter that records events instead of printing them, and a helper to
//! run a registry to completion against it.

#![allow(dead_code)]

use std::cell::RefCell;

use trial::message::{RunEvent, TestEvent};
use trial::report::Reporter;
use trial::{Registry, Scheduler, Totals};

/// Collects every event the scheduler emits.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub tests: RefCell<Vec<TestEvent>>,
    pub runs: RefCell<Vec<RunEvent>>,
}

impl Reporter for RecordingReporter {
    fn test_finished(&self, event: &TestEvent) {
        self.tests.borrow_mut().push(event.clone());
    }

    fn run_finished(&self, event: &RunEvent) {
        self.runs.borrow_mut().push(event.clone());
    }
}

/// Outcome of running one registry.
#[derive(Debug)]
pub struct Recorded {
    pub totals: Totals,
    pub tests: Vec<TestEvent>,
    pub runs: Vec<RunEvent>,
}

impl Recorded {
    /// `(context, name, success)` per test event, in emission order.
    pub fn summary(&self) -> Vec<(String, String, bool)> {
        self.tests
            .iter()
            .map(|e| (e.context.clone(), e.name.clone(), e.success()))
            .collect()
    }
}

/// Finishes `registry` and runs the plan with a recording reporter.
pub fn run(registry: Registry) -> Recorded {
    let mut scheduler = Scheduler::new(RecordingReporter::default());
    let totals = scheduler
        .execute(registry.finish())
        .expect("runtime should start");
    let reporter = scheduler.into_reporter();
    Recorded {
        totals,
        tests: reporter.tests.into_inner(),
        runs: reporter.runs.into_inner(),
    }
}

/// Builds a registry with `build` and runs it.
pub fn run_with(build: impl FnOnce(&mut Registry)) -> Recorded {
    let mut registry = Registry::new();
    build(&mut registry);
    run(registry)
}
