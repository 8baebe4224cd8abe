//! # Suite Registry
//!
//! Collects `describe`/`it`/hook registrations into suites. Registration is
//! fully synchronous: every `describe` body runs immediately, nested bodies
//! included, and nothing executes until [`Registry::finish`] hands the
//! pending queue to the scheduler.
//!
//! Registry Invariant: the pending queue holds suites in the order their
//! `describe` call was entered, so outer suites precede their nested suites
//! and siblings keep source order.

use std::collections::VecDeque;

use crate::config::ContextNaming;
use crate::errors::RegistryError;
use crate::suite::{Body, HookKind, IntoBodyFuture, Suite, Test};

/// Registration handle threaded through every `describe` body.
#[derive(Debug, Default)]
pub struct Registry {
    naming: ContextNaming,
    pending: Vec<Suite>,
    open: Vec<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(naming: ContextNaming) -> Self {
        Self {
            naming,
            ..Self::default()
        }
    }

    /// Registers a suite and runs `body` against it immediately.
    ///
    /// # Example
    /// ```
    /// use trial::Registry;
    /// let mut registry = Registry::new();
    /// registry.describe("math", |r| {
    ///     r.it("adds", || assert_eq!(1 + 1, 2));
    ///     r.describe("nested", |r| r.it("still runs", || ()));
    /// });
    /// let plan = registry.finish();
    /// assert_eq!(plan.contexts(), vec!["math", "math nested"]);
    /// ```
    pub fn describe<F>(&mut self, name: &str, body: F)
    where
        F: FnOnce(&mut Registry),
    {
        let context = self.compose_context(name);
        tracing::trace!(%context, depth = self.open.len(), "registering suite");
        self.pending.push(Suite::new(context));
        self.open.push(self.pending.len() - 1);
        body(self);
        self.open.pop();
    }

    /// Disabled variant of [`Registry::describe`]; registers nothing.
    pub fn describe_skip<F>(&mut self, name: &str, _body: F)
    where
        F: FnOnce(&mut Registry),
    {
        tracing::trace!(name, "skipping suite");
    }

    pub fn it<F, R>(&mut self, name: &str, body: F)
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        self.current("it").add_test(Test::new(name, Body::new(body)));
    }

    /// Disabled variant of [`Registry::it`]; registers nothing.
    pub fn it_skip<F, R>(&mut self, name: &str, _body: F)
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        tracing::trace!(name, "skipping test");
    }

    pub fn before<F, R>(&mut self, body: F)
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        self.hook("before", HookKind::Before, Body::new(body));
    }

    pub fn after<F, R>(&mut self, body: F)
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        self.hook("after", HookKind::After, Body::new(body));
    }

    pub fn before_each<F, R>(&mut self, body: F)
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        self.hook("before_each", HookKind::BeforeEach, Body::new(body));
    }

    pub fn after_each<F, R>(&mut self, body: F)
    where
        F: FnMut() -> R + 'static,
        R: IntoBodyFuture,
    {
        self.hook("after_each", HookKind::AfterEach, Body::new(body));
    }

    /// Ends registration and returns the pending queue as a [`Plan`].
    pub fn finish(self) -> Plan {
        tracing::debug!(suites = self.pending.len(), "registration complete");
        Plan {
            suites: self.pending.into(),
        }
    }

    fn hook(&mut self, call: &'static str, kind: HookKind, body: Body) {
        self.current(call).add_hook(kind, body);
    }

    fn compose_context(&self, name: &str) -> String {
        let ancestor = match self.naming {
            ContextNaming::RootAncestor => self.open.first(),
            ContextNaming::Parent => self.open.last(),
        };
        match ancestor {
            Some(&index) => format!("{} {}", self.pending[index].context, name),
            None => name.to_string(),
        }
    }

    fn current(&mut self, call: &'static str) -> &mut Suite {
        match self.open.last() {
            Some(&index) => &mut self.pending[index],
            None => panic!("{}", RegistryError::NoOpenSuite { call }),
        }
    }
}

/// The registered suites, in execution order.
#[derive(Debug, Default)]
pub struct Plan {
    suites: VecDeque<Suite>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    pub fn contexts(&self) -> Vec<&str> {
        self.suites.iter().map(|s| s.context.as_str()).collect()
    }

    pub fn suites(&self) -> impl Iterator<Item = &Suite> {
        self.suites.iter()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Suite> {
        self.suites.pop_front()
    }
}

impl From<Vec<Suite>> for Plan {
    fn from(suites: Vec<Suite>) -> Self {
        Self {
            suites: suites.into(),
        }
    }
}
