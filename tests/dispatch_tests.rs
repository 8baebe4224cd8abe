use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::FutureExt;
use futures_util::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use termcolor::Buffer;
use trial::dispatch::{BatchTotals, Dispatcher, Launcher, Worker};
use trial::message::{Message, Outcome, RunEvent, TestEvent, WorkerLine};
use trial::report::ConsoleReporter;
use trial::DispatchError;

/// What a scripted worker does.
#[derive(Clone)]
struct Script {
    lines: Vec<WorkerLine>,
    exit_code: Option<i32>,
}

impl Script {
    fn passing(context: &str, passed: u64) -> Self {
        let mut messages: Vec<Message> = (0..passed)
            .map(|i| {
                Message::Test(TestEvent {
                    context: context.into(),
                    name: format!("test {i}"),
                    duration: 0,
                    outcome: Outcome::Passed,
                })
            })
            .collect();
        messages.push(Message::Final(RunEvent {
            context: context.into(),
            success: true,
            passed,
            rejected: 0,
            duration: 1,
        }));
        Script {
            lines: messages.into_iter().map(WorkerLine::from).collect(),
            exit_code: Some(0),
        }
    }

    fn failing(context: &str, passed: u64, rejected: u64) -> Self {
        Script {
            lines: vec![WorkerLine::Message(Message::Final(RunEvent {
                context: context.into(),
                success: false,
                passed,
                rejected,
                duration: 1,
            }))],
            exit_code: Some(1),
        }
    }

    fn silent(exit_code: i32) -> Self {
        Script {
            lines: Vec::new(),
            exit_code: Some(exit_code),
        }
    }

    /// Prefixes the script with raw stdout lines from the suite code.
    fn after_printing(mut self, printed: &[&str]) -> Self {
        let mut lines: Vec<WorkerLine> = printed
            .iter()
            .flat_map(|line| WorkerLine::split(line))
            .collect();
        lines.append(&mut self.lines);
        self.lines = lines;
        self
    }
}

/// Launches scripted workers that sleep briefly, tracking concurrency.
#[derive(Default)]
struct FakeLauncher {
    scripts: HashMap<PathBuf, Script>,
    running: Rc<Cell<usize>>,
    peak: Rc<Cell<usize>>,
    launched: RefCell<Vec<PathBuf>>,
}

impl FakeLauncher {
    fn with(mut self, file: &str, script: Script) -> Self {
        self.scripts.insert(PathBuf::from(file), script);
        self
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, path: &Path) -> Result<Worker, DispatchError> {
        let script = self
            .scripts
            .get(path)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound {
                path: path.to_path_buf(),
            })?;
        self.launched.borrow_mut().push(path.to_path_buf());

        self.running.set(self.running.get() + 1);
        self.peak.set(self.peak.get().max(self.running.get()));

        let Script { lines, exit_code } = script;
        let lines = stream::once(tokio::time::sleep(Duration::from_millis(5)))
            .flat_map(move |_| stream::iter(lines.clone()))
            .boxed_local();
        let running = Rc::clone(&self.running);
        let exit = async move {
            running.set(running.get() - 1);
            exit_code
        }
        .boxed_local();
        Ok(Worker { lines, exit })
    }
}

fn run(
    launcher: FakeLauncher,
    files: &[&str],
    jobs: usize,
) -> (BatchTotals, String, String, FakeLauncher) {
    let dispatcher = Dispatcher::new(
        launcher,
        ConsoleReporter::with_sinks(Buffer::no_color(), Buffer::no_color()),
    )
    .with_max_workers(jobs);
    let files = files.iter().map(PathBuf::from).collect();
    let totals = dispatcher.run(files).unwrap();
    let (launcher, reporter) = dispatcher.into_parts();
    let (out, err) = reporter.into_sinks();
    (
        totals,
        String::from_utf8_lossy(out.as_slice()).into_owned(),
        String::from_utf8_lossy(err.as_slice()).into_owned(),
        launcher,
    )
}

#[test]
fn pool_never_exceeds_worker_ceiling() {
    let names: Vec<String> = (0..12).map(|i| format!("suite_{i:02}")).collect();
    let mut launcher = FakeLauncher::default();
    for name in &names {
        launcher = launcher.with(name, Script::passing(name, 1));
    }
    let files: Vec<&str> = names.iter().map(String::as_str).collect();

    let (totals, _, _, launcher) = run(launcher, &files, 5);

    assert_eq!(totals, BatchTotals { passed: 12, failed: 0 });
    assert_eq!(launcher.peak.get(), 5);
    assert_eq!(launcher.running.get(), 0);
    assert_eq!(launcher.launched.borrow().len(), 12);
}

#[test]
fn workers_start_in_file_order() {
    let launcher = FakeLauncher::default()
        .with("suite_a", Script::passing("a", 1))
        .with("suite_b", Script::passing("b", 1))
        .with("suite_c", Script::passing("c", 1));

    let (_, _, _, launcher) = run(launcher, &["suite_a", "suite_b", "suite_c"], 1);

    assert_eq!(launcher.peak.get(), 1);
    assert_eq!(
        *launcher.launched.borrow(),
        vec![
            PathBuf::from("suite_a"),
            PathBuf::from("suite_b"),
            PathBuf::from("suite_c")
        ]
    );
}

#[test]
fn clean_exit_without_final_message_is_a_failure() {
    let launcher = FakeLauncher::default()
        .with("suite_ok", Script::passing("ok", 2))
        .with("suite_quiet", Script::silent(0));

    let (totals, _, err, _) = run(launcher, &["suite_ok", "suite_quiet"], 5);

    assert_eq!(totals, BatchTotals { passed: 2, failed: 1 });
    assert!(!totals.success());
    assert!(err.contains("x suite_quiet: worker exited (code 0) without a final message"));
}

#[test]
fn failing_worker_does_not_stop_the_batch() {
    let launcher = FakeLauncher::default()
        .with("suite_bad", Script::failing("bad", 1, 2))
        .with("suite_good", Script::passing("good", 3));

    let (totals, out, err, _) = run(launcher, &["suite_bad", "suite_good"], 1);

    assert_eq!(totals, BatchTotals { passed: 4, failed: 2 });
    assert!(err.contains("x bad"));
    assert!(out.contains("√ good - test 0 (0ms)"));
    assert!(out.contains("√ good (1ms)"));
}

#[test]
fn launch_failure_counts_as_one_failed_file() {
    let launcher = FakeLauncher::default().with("suite_ok", Script::passing("ok", 1));

    let (totals, _, err, _) = run(launcher, &["suite_missing", "suite_ok"], 2);

    assert_eq!(totals, BatchTotals { passed: 1, failed: 1 });
    assert!(err.contains("x suite_missing:"));
}

#[test]
fn summary_is_printed_exactly_once() {
    let launcher = FakeLauncher::default()
        .with("suite_a", Script::passing("a", 1))
        .with("suite_b", Script::passing("b", 2));

    let (_, out, _, _) = run(launcher, &["suite_a", "suite_b"], 2);

    assert_eq!(out.matches("tests passed").count(), 1);
    assert!(out.ends_with("\n3 tests passed, 0 tests failed.\n"));
}

#[test]
fn empty_batch_still_prints_summary() {
    let (totals, out, _, _) = run(FakeLauncher::default(), &[], 5);
    assert!(totals.success());
    assert_eq!(out, "\n0 tests passed, 0 tests failed.\n");
}

#[test]
fn unterminated_print_does_not_swallow_the_final_message() {
    let final_line = Message::Final(RunEvent {
        context: "chatty".into(),
        success: true,
        passed: 2,
        rejected: 0,
        duration: 1,
    })
    .to_line()
    .unwrap();
    let glued = format!("progress...{final_line}");
    let launcher = FakeLauncher::default().with(
        "suite_chatty",
        Script::silent(0).after_printing(&["loading fixtures", "", &glued]),
    );

    let (totals, out, err, _) = run(launcher, &["suite_chatty"], 1);

    assert_eq!(totals, BatchTotals { passed: 2, failed: 0 });
    assert!(err.is_empty());
    assert_eq!(
        out,
        "loading fixtures\nprogress...\n√ chatty (1ms)\n\n2 tests passed, 0 tests failed.\n"
    );
}
