//! Call-recording stand-ins.
//!
//! A [`Spy`] counts its invocations, keeps the arguments of the most recent
//! call and answers with a configured return value. Bound to an [`Object`]
//! member it replaces that member until [`Spy::restore`] puts the original
//! back.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::{Object, Value, WeakObject};

#[derive(Default)]
struct SpyState {
    calls: usize,
    last_args: Vec<Value>,
    returns: Value,
    binding: Option<Binding>,
}

struct Binding {
    target: WeakObject,
    member: String,
    original: Option<Value>,
}

/// A shared handle to a recording stand-in. Clones observe the same calls.
#[derive(Clone, Default)]
pub struct Spy(Rc<RefCell<SpyState>>);

impl Spy {
    /// Creates an unbound spy returning `undefined`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `target[member]` with a new spy, retaining the original for
    /// [`Spy::restore`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use trial::{values, Object, Spy, Value};
    /// let target = Object::new().field("greet", Value::function(|_| Ok(Value::from("hi"))));
    /// let spy = Spy::on(&target, "greet").returns("stubbed");
    /// assert_eq!(target.call("greet", values![]).unwrap().to_string(), "stubbed");
    /// spy.restore();
    /// assert_eq!(target.call("greet", values![]).unwrap().to_string(), "hi");
    /// ```
    pub fn on(target: &Object, member: &str) -> Self {
        let spy = Spy::new();
        let original = target.set(member, Value::Spy(spy.clone()));
        spy.0.borrow_mut().binding = Some(Binding {
            target: target.downgrade(),
            member: member.to_string(),
            original,
        });
        spy
    }

    /// Records the call and returns the configured value.
    pub fn call(&self, args: Vec<Value>) -> Value {
        let mut state = self.0.borrow_mut();
        state.calls += 1;
        state.last_args = args;
        state.returns.clone()
    }

    pub fn call_count(&self) -> usize {
        self.0.borrow().calls
    }

    /// Arguments of the most recent call only.
    pub fn last_args(&self) -> Vec<Value> {
        self.0.borrow().last_args.clone()
    }

    /// Configures the value returned by subsequent calls.
    pub fn returns(&self, value: impl Into<Value>) -> Self {
        self.0.borrow_mut().returns = value.into();
        self.clone()
    }

    /// Clears the call counter and recorded arguments.
    pub fn reset(&self) {
        let mut state = self.0.borrow_mut();
        state.calls = 0;
        state.last_args.clear();
    }

    /// Writes the original member back onto the target. Returns `false` for
    /// unbound spies or when the target no longer exists.
    pub fn restore(&self) -> bool {
        let Some(binding) = self.0.borrow_mut().binding.take() else {
            return false;
        };
        let Some(target) = binding.target.upgrade() else {
            return false;
        };
        match binding.original {
            Some(original) => {
                target.set(binding.member, original);
            }
            None => {
                target.remove(&binding.member);
            }
        }
        true
    }

    pub fn ptr_eq(&self, other: &Spy) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Spy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("Spy")
            .field("calls", &state.calls)
            .field("last_args", &state.last_args)
            .field("bound", &state.binding.is_some())
            .finish()
    }
}
