mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use common::{run, run_with};
use pretty_assertions::assert_eq;
use trial::message::Outcome;
use trial::{asynchronous, expect, Failure, Phase, Registry, Scheduler};

type Log = Rc<RefCell<Vec<String>>>;

fn logger(log: &Log, entry: &str) -> impl FnMut() + 'static {
    let log = Rc::clone(log);
    let entry = entry.to_string();
    move || log.borrow_mut().push(entry.clone())
}

#[test]
fn hooks_wrap_each_test_in_the_documented_order() {
    let log: Log = Rc::default();
    let recorded = run_with(|r| {
        r.describe("order", |r| {
            r.before(logger(&log, "before 1"));
            r.before(logger(&log, "before 2"));
            r.before_each(logger(&log, "beforeEach 1"));
            r.before_each(logger(&log, "beforeEach 2"));
            r.after_each(logger(&log, "afterEach 1"));
            r.after_each(logger(&log, "afterEach 2"));
            r.after(logger(&log, "after 1"));
            r.after(logger(&log, "after 2"));
            r.it("t1", logger(&log, "t1"));
            r.it("t2", logger(&log, "t2"));
        });
    });

    assert!(recorded.totals.success());
    assert_eq!(
        *log.borrow(),
        vec![
            "before 1",
            "before 2",
            "beforeEach 1",
            "beforeEach 2",
            "t1",
            "afterEach 2",
            "afterEach 1",
            "beforeEach 1",
            "beforeEach 2",
            "t2",
            "afterEach 2",
            "afterEach 1",
            "after 2",
            "after 1",
        ]
    );
}

#[test]
fn one_event_per_registered_test() {
    let recorded = run_with(|r| {
        r.describe("math", |r| {
            r.it("adds", || expect(1 + 1).to_equal(2));
            r.it("fails", || expect(1 + 1).to_equal(3));
            r.it_skip("skipped", || ());
            r.describe("nested", |r| r.it("passes", || ()));
        });
    });

    assert_eq!(
        recorded.summary(),
        vec![
            ("math".to_string(), "adds".to_string(), true),
            ("math".to_string(), "fails".to_string(), false),
            ("math nested".to_string(), "passes".to_string(), true),
        ]
    );
    assert_eq!(recorded.totals.passed, 2);
    assert_eq!(recorded.totals.rejected, 1);
}

#[test]
fn final_event_carries_first_context_and_totals() {
    let recorded = run_with(|r| {
        r.describe("first", |r| r.it("ok", || ()));
        r.describe("second", |r| r.it("bad", || expect(false).to_be_true()));
    });

    assert_eq!(recorded.runs.len(), 1);
    let run = &recorded.runs[0];
    assert_eq!(run.context, "first");
    assert_eq!((run.passed, run.rejected, run.success), (1, 1, false));
}

#[test]
fn failing_before_each_fails_only_that_test() {
    let calls = Rc::new(Cell::new(0));
    let body_ran: Log = Rc::default();
    let recorded = run_with(|r| {
        r.describe("flaky setup", |r| {
            let calls = Rc::clone(&calls);
            r.before_each(move || {
                calls.set(calls.get() + 1);
                if calls.get() == 2 {
                    return Err(Failure::assertion("setup broke"));
                }
                Ok(())
            });
            r.it("one", logger(&body_ran, "one"));
            r.it("two", logger(&body_ran, "two"));
            r.it("three", logger(&body_ran, "three"));
        });
    });

    assert_eq!(*body_ran.borrow(), vec!["one", "three"]);
    let outcomes: Vec<bool> = recorded.tests.iter().map(|e| e.success()).collect();
    assert_eq!(outcomes, vec![true, false, true]);
    match &recorded.tests[1].outcome {
        Outcome::Failed { error, stack } => {
            assert_eq!(error, "setup broke");
            assert!(stack.contains("\"beforeEach\" hook"));
        }
        Outcome::Passed => panic!("second test should fail"),
    }
}

#[test]
fn failing_after_each_fails_its_test_but_not_the_next() {
    let calls = Rc::new(Cell::new(0));
    let recorded = run_with(|r| {
        r.describe("flaky teardown", |r| {
            let calls = Rc::clone(&calls);
            r.after_each(move || {
                calls.set(calls.get() + 1);
                expect(calls.get()).to_not_deep_equal(1)
            });
            r.it("one", || ());
            r.it("two", || ());
        });
    });

    let outcomes: Vec<bool> = recorded.tests.iter().map(|e| e.success()).collect();
    assert_eq!(outcomes, vec![false, true]);
}

#[test]
fn failing_hook_waits_for_async_siblings() {
    let log: Log = Rc::default();
    let recorded = run_with(|r| {
        r.describe("cleanup", |r| {
            let released = Rc::clone(&log);
            r.after_each(asynchronous(move || {
                let released = Rc::clone(&released);
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    released.borrow_mut().push("released resource".to_string());
                    Ok(())
                }
            }));
            r.after_each(|| Err::<(), _>(Failure::assertion("teardown broke")));
            r.it("t", || ());
        });
    });

    assert_eq!(*log.borrow(), vec!["released resource"]);
    assert_eq!(
        recorded.summary(),
        vec![("cleanup".to_string(), "t".to_string(), false)]
    );
    match &recorded.tests[0].outcome {
        Outcome::Failed { error, .. } => assert_eq!(error, "teardown broke"),
        Outcome::Passed => panic!("teardown failure should fail the test"),
    }
}

#[test]
fn first_failure_in_execution_order_wins() {
    let recorded = run_with(|r| {
        r.describe("two failures", |r| {
            r.before_each(asynchronous(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(Failure::assertion("slow first"))
            }));
            r.before_each(|| Err::<(), _>(Failure::assertion("fast second")));
            r.it("t", || ());
        });
    });

    match &recorded.tests[0].outcome {
        Outcome::Failed { error, .. } => assert_eq!(error, "slow first"),
        Outcome::Passed => panic!("setup failure should fail the test"),
    }
}

#[test]
fn failing_before_stops_the_suite() {
    let ran: Log = Rc::default();
    let recorded = run_with(|r| {
        r.describe("broken", |r| {
            r.before(|| Err::<(), _>(Failure::assertion("no database")));
            r.it("never", logger(&ran, "test"));
            r.after(logger(&ran, "after"));
        });
        r.describe("healthy", |r| r.it("still runs", logger(&ran, "healthy")));
    });

    assert_eq!(*ran.borrow(), vec!["healthy"]);
    assert_eq!(
        recorded.summary(),
        vec![
            ("broken".to_string(), "\"before\" hook".to_string(), false),
            ("healthy".to_string(), "still runs".to_string(), true),
        ]
    );
    assert_eq!(recorded.totals.rejected, 1);
}

#[test]
fn failing_after_keeps_earlier_passes() {
    let recorded = run_with(|r| {
        r.describe("teardown", |r| {
            r.it("passes", || ());
            r.after(|| expect(1).to_equal(2));
        });
    });

    assert_eq!(recorded.totals.passed, 1);
    assert_eq!(recorded.totals.rejected, 1);
    assert_eq!(recorded.tests[1].name, "\"after\" hook");
}

#[test]
fn panics_become_failures_with_their_location() {
    let recorded = run_with(|r| {
        r.describe("panics", |r| {
            r.it("asserts", || assert_eq!(1, 2, "numbers differ"));
            r.it("survives", || ());
        });
    });

    assert_eq!(recorded.totals.rejected, 1);
    assert_eq!(recorded.totals.passed, 1);
    match &recorded.tests[0].outcome {
        Outcome::Failed { error, stack } => {
            assert!(error.contains("numbers differ"));
            assert!(stack.contains("scheduler_tests.rs"));
        }
        Outcome::Passed => panic!("panicking test should fail"),
    }
}

#[test]
fn async_bodies_are_awaited() {
    let flag = Rc::new(Cell::new(false));
    let recorded = run_with(|r| {
        r.describe("async", |r| {
            let set = Rc::clone(&flag);
            r.before(asynchronous(move || {
                let set = Rc::clone(&set);
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    set.set(true);
                    Ok(())
                }
            }));
            let seen = Rc::clone(&flag);
            r.it("sees setup", move || expect(seen.get()).to_be_true());
            r.it(
                "rejects later",
                asynchronous(|| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    expect("late").to_equal("early")
                }),
            );
        });
    });

    let outcomes: Vec<bool> = recorded.tests.iter().map(|e| e.success()).collect();
    assert_eq!(outcomes, vec![true, false]);
}

#[test]
fn scheduler_finishes_in_done_phase() {
    let mut registry = Registry::new();
    registry.describe("phases", |r| r.it("ok", || ()));

    let mut scheduler = Scheduler::new(common::RecordingReporter::default());
    assert_eq!(scheduler.phase(), Phase::Registering);
    scheduler.execute(registry.finish()).unwrap();
    assert_eq!(scheduler.phase(), Phase::Done);
}

#[test]
fn empty_plan_reports_zero_totals() {
    let recorded = run(Registry::new());
    assert!(recorded.tests.is_empty());
    assert_eq!(recorded.runs.len(), 1);
    assert_eq!(recorded.runs[0].context, "");
    assert!(recorded.runs[0].success);
}
