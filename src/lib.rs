pub use crate::config::{ColorMode, Config, ContextNaming};
pub use crate::errors::{DispatchError, Failure, HarnessError, ProtocolError, RegistryError};
pub use crate::expect::{expect, expect_with, Class, Expectation, ThrowMatch, TypeCheck};
pub use crate::harness::{run_main, run_plan};
pub use crate::registry::{Plan, Registry};
pub use crate::scheduler::{Phase, Scheduler, Totals};
pub use crate::spy::Spy;
pub use crate::suite::asynchronous;
pub use crate::value::{Category, ErrorValue, Function, Object, Value};

pub mod cli;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod errors;
pub mod expect;
pub mod harness;
pub mod message;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod spy;
pub mod suite;
pub mod value;
