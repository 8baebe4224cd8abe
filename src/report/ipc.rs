//! Forwards events to a parent dispatcher as JSON lines.
//!
//! Each message is written on a fresh line: suite code may have printed
//! without a trailing newline, and the dispatcher drops blank lines.

use std::cell::RefCell;
use std::io::{self, Stdout, Write};

use crate::message::{Message, RunEvent, TestEvent};
use crate::report::Reporter;

pub struct IpcReporter<W = Stdout> {
    sink: RefCell<W>,
}

impl IpcReporter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> IpcReporter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: RefCell::new(sink),
        }
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    fn send(&self, message: Message) {
        let line = match message.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("dropping unserializable message: {e}");
                return;
            }
        };
        let mut sink = self.sink.borrow_mut();
        if let Err(e) = write!(sink, "\n{}\n", line).and_then(|_| sink.flush()) {
            tracing::warn!("failed to forward message to dispatcher: {e}");
        }
    }
}

impl<W: Write> Reporter for IpcReporter<W> {
    fn test_finished(&self, event: &TestEvent) {
        self.send(Message::Test(event.clone()));
    }

    fn run_finished(&self, event: &RunEvent) {
        self.send(Message::Final(event.clone()));
    }
}
