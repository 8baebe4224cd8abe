//! Colored terminal output for test, suite and batch results.

use std::cell::RefCell;
use std::io::{self, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::message::{Outcome, RunEvent, TestEvent};
use crate::report::Reporter;

/// Prints passes to `out` and failures to `err`.
pub struct ConsoleReporter<W = StandardStream> {
    out: RefCell<W>,
    err: RefCell<W>,
}

impl ConsoleReporter<StandardStream> {
    pub fn new(choice: ColorChoice) -> Self {
        Self::with_sinks(StandardStream::stdout(choice), StandardStream::stderr(choice))
    }
}

impl<W: WriteColor> ConsoleReporter<W> {
    pub fn with_sinks(out: W, err: W) -> Self {
        Self {
            out: RefCell::new(out),
            err: RefCell::new(err),
        }
    }

    pub fn into_sinks(self) -> (W, W) {
        (self.out.into_inner(), self.err.into_inner())
    }

    /// `√ context - name (Nms)` or `x context - name: error` plus the stack.
    pub fn print_test(&self, event: &TestEvent) {
        let result = match &event.outcome {
            Outcome::Passed => write_line(
                &mut *self.out.borrow_mut(),
                Color::Green,
                &format!("√ {} - {} ({}ms)", event.context, event.name, event.duration),
            ),
            Outcome::Failed { error, stack } => {
                let mut err = self.err.borrow_mut();
                write_line(
                    &mut *err,
                    Color::Red,
                    &format!("x {} - {}: {}", event.context, event.name, error),
                )
                .and_then(|_| write_dimmed(&mut *err, stack))
            }
        };
        report_io(result);
    }

    /// `√ context (Nms)` for a clean run, `x context` otherwise.
    pub fn print_suite(&self, event: &RunEvent) {
        let result = if event.success {
            write_line(
                &mut *self.out.borrow_mut(),
                Color::Green,
                &format!("√ {} ({}ms)", event.context, event.duration),
            )
        } else {
            write_line(
                &mut *self.err.borrow_mut(),
                Color::Red,
                &format!("x {}", event.context),
            )
        };
        report_io(result);
    }

    /// `x file: reason` for a worker that failed outside the protocol.
    pub fn print_worker_failure(&self, file: &str, reason: &str) {
        report_io(write_line(
            &mut *self.err.borrow_mut(),
            Color::Red,
            &format!("x {}: {}", file, reason),
        ));
    }

    /// Worker output that is not part of the protocol, echoed unstyled.
    pub fn print_passthrough(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        report_io(writeln!(out, "{}", text).and_then(|_| out.flush()));
    }

    /// The closing `N tests passed, M tests failed.` line.
    pub fn print_totals(&self, passed: u64, failed: u64) {
        report_io(write_totals(&mut *self.out.borrow_mut(), passed, failed));
    }
}

impl<W: WriteColor> Reporter for ConsoleReporter<W> {
    fn test_finished(&self, event: &TestEvent) {
        self.print_test(event);
    }

    fn run_finished(&self, event: &RunEvent) {
        self.print_suite(event);
        self.print_totals(event.passed, event.rejected);
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn write_line<W: WriteColor + ?Sized>(sink: &mut W, color: Color, text: &str) -> io::Result<()> {
    sink.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(sink, "{}", text)?;
    sink.reset()?;
    writeln!(sink)?;
    sink.flush()
}

fn write_dimmed<W: WriteColor + ?Sized>(sink: &mut W, text: &str) -> io::Result<()> {
    sink.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(sink, "{}", text)?;
    sink.reset()?;
    writeln!(sink)?;
    writeln!(sink)?;
    sink.flush()
}

fn write_totals<W: WriteColor + ?Sized>(sink: &mut W, passed: u64, failed: u64) -> io::Result<()> {
    writeln!(sink)?;
    sink.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(sink, "{}", passed)?;
    sink.reset()?;
    write!(sink, " tests passed, ")?;
    sink.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
    write!(sink, "{}", failed)?;
    sink.reset()?;
    writeln!(sink, " tests failed.")?;
    sink.flush()
}

fn report_io(result: io::Result<()>) {
    if let Err(e) = result {
        tracing::warn!("failed to write report output: {e}");
    }
}
