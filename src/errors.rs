//! Trial Error Handling
//!
//! Three families of errors live here:
//!
//! - [`Failure`]: what a hook or test body produces when it does not pass.
//!   Assertion failures, usage errors and caught panics all share this shape
//!   so the scheduler can classify them at the per-test boundary.
//! - [`DispatchError`]: problems launching or discovering worker processes,
//!   rendered through `miette` by the CLI.
//! - [`ProtocolError`] and [`HarnessError`]: wire decoding and runtime setup.

use std::panic::Location;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::suite::HookKind;

// ============================================================================
// TEST FAILURES
// ============================================================================

/// The single failure type for hooks and test bodies.
#[derive(Debug, Error)]
pub enum Failure {
    /// A matcher's predicate was false.
    #[error("{message}")]
    Assertion {
        message: String,
        location: &'static Location<'static>,
    },
    /// A matcher was applied to a value outside the categories it supports.
    #[error("{message}")]
    Usage {
        message: String,
        location: &'static Location<'static>,
    },
    /// A body panicked; the payload becomes the message.
    #[error("{message}")]
    Panic {
        message: String,
        location: Option<String>,
    },
    /// A hook failed; wraps the underlying failure.
    #[error("{source}")]
    Hook {
        kind: HookKind,
        source: Box<Failure>,
    },
}

impl Failure {
    #[track_caller]
    pub fn assertion(message: impl Into<String>) -> Self {
        Failure::Assertion {
            message: message.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn usage(message: impl Into<String>) -> Self {
        Failure::Usage {
            message: message.into(),
            location: Location::caller(),
        }
    }

    pub(crate) fn panic(message: String, location: Option<String>) -> Self {
        Failure::Panic { message, location }
    }

    pub fn is_usage(&self) -> bool {
        match self {
            Failure::Usage { .. } => true,
            Failure::Hook { source, .. } => source.is_usage(),
            _ => false,
        }
    }

    /// The text reported as the failure's stack trace.
    pub fn stack(&self) -> String {
        match self {
            Failure::Assertion { message, location } | Failure::Usage { message, location } => {
                format!("Error: {}\n    at {}", message, location)
            }
            Failure::Panic {
                message,
                location: Some(location),
            } => format!("panicked: {}\n    at {}", message, location),
            Failure::Panic { message, .. } => format!("panicked: {}", message),
            Failure::Hook { kind, source } => {
                format!("{}\n    in \"{}\" hook", source.stack(), kind)
            }
        }
    }
}

// ============================================================================
// REGISTRATION ERRORS
// ============================================================================

/// Misuse of the registration surface. Raised as a panic at the call site.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("`{call}` called outside of a `describe` body: there is no open suite to register into")]
    NoOpenSuite { call: &'static str },
}

// ============================================================================
// WIRE PROTOCOL ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is missing the `{0}` field")]
    MissingField(&'static str),
}

// ============================================================================
// DISPATCH AND HARNESS ERRORS
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum DispatchError {
    #[error("failed to launch worker for '{}'", path.display())]
    #[diagnostic(
        code(trial::dispatch::launch),
        help("suite files must be executables built against the trial harness")
    )]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker for '{}' has no stdout pipe", path.display())]
    #[diagnostic(code(trial::dispatch::pipe))]
    MissingPipe { path: PathBuf },

    #[error("path '{}' does not exist", path.display())]
    #[diagnostic(code(trial::discovery::not_found))]
    NotFound { path: PathBuf },

    #[error("failed to walk directory: {0}")]
    #[diagnostic(code(trial::discovery::walk))]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("failed to start the async runtime: {0}")]
    #[diagnostic(code(trial::runtime))]
    Runtime(#[source] std::io::Error),
}
