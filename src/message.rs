//! Reporter events and their wire form.
//!
//! Workers send one JSON object per line:
//!
//! ```text
//! {"final":false,"success":true,"context":"math","name":"adds","duration":0}
//! {"final":false,"success":false,"context":"math","name":"divides","duration":1,"error":"...","stack":"..."}
//! {"final":true,"success":true,"context":"math","passed":2,"rejected":0,"duration":3}
//! ```
//!
//! Every object opens with its `"final"` key, so a message glued to the end
//! of unterminated user output can still be recovered.

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Outcome of one test pipeline (beforeEach, body, afterEach).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed { error: String, stack: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEvent {
    pub context: String,
    pub name: String,
    pub duration: u64,
    pub outcome: Outcome,
}

impl TestEvent {
    pub fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Passed)
    }
}

/// Emitted once per run, after the pending queue is drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub context: String,
    pub success: bool,
    pub passed: u64,
    pub rejected: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Wire", into = "Wire")]
pub enum Message {
    Test(TestEvent),
    Final(RunEvent),
}

impl Message {
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Splits a line into leading plain text and a trailing message, if any.
    pub fn extract(line: &str) -> (&str, Option<Message>) {
        if let Ok(message) = Message::parse(line) {
            return ("", Some(message));
        }
        for (start, _) in line.match_indices(MESSAGE_OPENING) {
            if let Ok(message) = Message::parse(&line[start..]) {
                return (&line[..start], Some(message));
            }
        }
        (line, None)
    }
}

const MESSAGE_OPENING: &str = "{\"final\"";

/// One piece of worker output as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerLine {
    Message(Message),
    Text(String),
}

impl WorkerLine {
    /// Decodes one line of worker stdout. Blank text is dropped.
    pub fn split(line: &str) -> Vec<WorkerLine> {
        let (text, message) = Message::extract(line);
        let mut pieces = Vec::with_capacity(2);
        if !text.trim().is_empty() {
            pieces.push(WorkerLine::Text(text.to_string()));
        }
        if let Some(message) = message {
            pieces.push(WorkerLine::Message(message));
        }
        pieces
    }
}

impl From<Message> for WorkerLine {
    fn from(message: Message) -> Self {
        WorkerLine::Message(message)
    }
}

impl From<TestEvent> for Message {
    fn from(event: TestEvent) -> Self {
        Message::Test(event)
    }
}

impl From<RunEvent> for Message {
    fn from(event: RunEvent) -> Self {
        Message::Final(event)
    }
}

// ============================================================================
// WIRE FORM
// ============================================================================

#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(rename = "final")]
    is_final: bool,
    success: bool,
    context: String,
    duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejected: Option<u64>,
}

impl From<Message> for Wire {
    fn from(message: Message) -> Self {
        match message {
            Message::Test(event) => {
                let success = event.success();
                let (error, stack) = match event.outcome {
                    Outcome::Passed => (None, None),
                    Outcome::Failed { error, stack } => (Some(error), Some(stack)),
                };
                Wire {
                    is_final: false,
                    success,
                    context: event.context,
                    duration: event.duration,
                    name: Some(event.name),
                    error,
                    stack,
                    passed: None,
                    rejected: None,
                }
            }
            Message::Final(event) => Wire {
                is_final: true,
                success: event.success,
                context: event.context,
                duration: event.duration,
                name: None,
                error: None,
                stack: None,
                passed: Some(event.passed),
                rejected: Some(event.rejected),
            },
        }
    }
}

impl TryFrom<Wire> for Message {
    type Error = ProtocolError;

    fn try_from(wire: Wire) -> Result<Self, Self::Error> {
        if wire.is_final {
            return Ok(Message::Final(RunEvent {
                context: wire.context,
                success: wire.success,
                passed: wire.passed.ok_or(ProtocolError::MissingField("passed"))?,
                rejected: wire.rejected.ok_or(ProtocolError::MissingField("rejected"))?,
                duration: wire.duration,
            }));
        }
        let outcome = if wire.success {
            Outcome::Passed
        } else {
            Outcome::Failed {
                error: wire.error.unwrap_or_default(),
                stack: wire.stack.unwrap_or_default(),
            }
        };
        Ok(Message::Test(TestEvent {
            context: wire.context,
            name: wire.name.ok_or(ProtocolError::MissingField("name"))?,
            duration: wire.duration,
            outcome,
        }))
    }
}
