//! Suite data model: suites, hooks, tests and the callable bodies they run.

use std::fmt;
use std::future::{ready, Future};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;

use futures_util::future::{FutureExt, LocalBoxFuture};

use crate::errors::Failure;
use crate::value::{panic_message, take_panic_location};

/// The future every body is normalised into.
pub type BodyFuture = LocalBoxFuture<'static, Result<(), Failure>>;

/// Anything a hook or test body may return: nothing, a result, or an
/// awaitable of either.
pub trait IntoBodyFuture {
    fn into_body_future(self) -> BodyFuture;
}

impl IntoBodyFuture for () {
    fn into_body_future(self) -> BodyFuture {
        Box::pin(ready(Ok(())))
    }
}

impl IntoBodyFuture for Result<(), Failure> {
    fn into_body_future(self) -> BodyFuture {
        Box::pin(ready(self))
    }
}

impl IntoBodyFuture for Pin<Box<dyn Future<Output = Result<(), Failure>>>> {
    fn into_body_future(self) -> BodyFuture {
        self
    }
}

impl IntoBodyFuture for Pin<Box<dyn Future<Output = ()>>> {
    fn into_body_future(self) -> BodyFuture {
        Box::pin(self.map(Ok))
    }
}

/// Adapts a closure returning an `async` block into a body.
///
/// ```rust
/// use trial::{asynchronous, expect, Registry};
/// let mut registry = Registry::new();
/// registry.describe("timers", |r| {
///     r.it("waits", asynchronous(|| async {
///         tokio::time::sleep(std::time::Duration::from_millis(1)).await;
///         expect(true).to_be_true()
///     }));
/// });
/// ```
pub fn asynchronous<F, Fut>(mut f: F) -> impl FnMut() -> BodyFuture
where
    F: FnMut() -> Fut + 'static,
    Fut: Future<Output = Result<(), Failure>> + 'static,
{
    move || Box::pin(f()) as BodyFuture
}

/// A zero-argument callable producing a [`BodyFuture`].
pub struct Body(Box<dyn FnMut() -> BodyFuture>);

impl Body {
    pub fn new<F, R>(mut f: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        Body(Box::new(move || f().into_body_future()))
    }

    /// Starts the body. The synchronous part runs immediately; panics from
    /// either part surface as [`Failure::Panic`].
    pub fn invoke(&mut self) -> BodyFuture {
        let f = &mut self.0;
        match panic::catch_unwind(AssertUnwindSafe(|| f())) {
            Ok(future) => Box::pin(AssertUnwindSafe(future).catch_unwind().map(|outcome| {
                match outcome {
                    Ok(result) => result,
                    Err(payload) => Err(caught(payload.as_ref())),
                }
            })),
            Err(payload) => Box::pin(ready(Err(caught(payload.as_ref())))),
        }
    }
}

fn caught(payload: &(dyn std::any::Any + Send)) -> Failure {
    Failure::panic(panic_message(payload), take_panic_location())
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body(..)")
    }
}

// ============================================================================
// HOOKS AND TESTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Before,
    BeforeEach,
    AfterEach,
    After,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::Before => "before",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
            HookKind::After => "after",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub struct Hook {
    pub kind: HookKind,
    body: Body,
}

impl Hook {
    pub fn new(kind: HookKind, body: Body) -> Self {
        Self { kind, body }
    }

    /// Runs the hook, tagging any failure with the hook kind.
    pub fn run(&mut self) -> BodyFuture {
        let kind = self.kind;
        Box::pin(self.body.invoke().map(move |result| {
            result.map_err(|source| Failure::Hook {
                kind,
                source: Box::new(source),
            })
        }))
    }
}

#[derive(Debug)]
pub struct Test {
    pub name: String,
    body: Body,
}

impl Test {
    pub fn new(name: impl Into<String>, body: Body) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn run(&mut self) -> BodyFuture {
        self.body.invoke()
    }
}

// ============================================================================
// SUITE
// ============================================================================

/// A named group of tests plus its hooks.
///
/// Hook lists are kept in execution order: `before`/`before_each` in
/// registration order, `after_each`/`after` with the latest registration
/// first.
#[derive(Debug)]
pub struct Suite {
    pub context: String,
    pub before: Vec<Hook>,
    pub before_each: Vec<Hook>,
    pub tests: Vec<Test>,
    pub after_each: Vec<Hook>,
    pub after: Vec<Hook>,
}

impl Suite {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            before: Vec::new(),
            before_each: Vec::new(),
            tests: Vec::new(),
            after_each: Vec::new(),
            after: Vec::new(),
        }
    }

    pub fn add_hook(&mut self, kind: HookKind, body: Body) {
        let hook = Hook::new(kind, body);
        match kind {
            HookKind::Before => self.before.push(hook),
            HookKind::BeforeEach => self.before_each.push(hook),
            HookKind::AfterEach => self.after_each.insert(0, hook),
            HookKind::After => self.after.insert(0, hook),
        }
    }

    pub fn add_test(&mut self, test: Test) {
        self.tests.push(test);
    }

    pub fn hooks(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::Before => &self.before,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
            HookKind::After => &self.after,
        }
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name.as_str()).collect()
    }
}
