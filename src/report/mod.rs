//! Result reporting.
//!
//! The scheduler talks to a [`Reporter`]; which one it gets is decided by
//! whoever starts the run. Local runs print through [`ConsoleReporter`],
//! workers managed by the dispatcher forward through [`IpcReporter`].

use crate::message::{RunEvent, TestEvent};

pub mod console;
pub mod ipc;

pub use console::ConsoleReporter;
pub use ipc::IpcReporter;

/// Sink for scheduler events.
pub trait Reporter {
    fn test_finished(&self, event: &TestEvent);
    fn run_finished(&self, event: &RunEvent);
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn test_finished(&self, event: &TestEvent) {
        (**self).test_finished(event)
    }

    fn run_finished(&self, event: &RunEvent) {
        (**self).run_finished(event)
    }
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn test_finished(&self, event: &TestEvent) {
        (**self).test_finished(event)
    }

    fn run_finished(&self, event: &RunEvent) {
        (**self).run_finished(event)
    }
}
