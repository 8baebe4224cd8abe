//! The dynamic value model shared by the assertion engine and spies.
//!
//! Primitives (`undefined`, `null`, booleans, numbers, text) compare by value.
//! Heap values (sequences, objects, errors, patterns, functions, spies) are
//! reference counted handles and compare by identity under strict equality.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Once;

use chrono::{DateTime, Utc};
use im::HashMap;
use regex::Regex;

use crate::spy::Spy;

/// Represents a value observed by an assertion or recorded by a spy.
///
/// # Examples
///
/// ```rust
/// use trial::Value;
/// let n = Value::from(3.5);
/// assert_eq!(n.type_tag(), "number");
/// let s = Value::from("hello");
/// assert_eq!(s.type_tag(), "string");
/// assert!(Value::default().is_undefined());
/// ```
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Sequence(Rc<Vec<Value>>),
    Object(Object),
    Date(DateTime<Utc>),
    Error(Rc<ErrorValue>),
    Pattern(Rc<Regex>),
    Function(Function),
    Spy(Spy),
}

/// The closed set of shapes matchers dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Sequence,
    Text,
    Numeric,
    Keyed,
    Other,
}

impl Value {
    /// Builds a sequence value from anything convertible.
    pub fn seq<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Sequence(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Builds an error value of the given class.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use trial::Value;
    /// let e = Value::error("TypeError", "bad input");
    /// assert!(e.is_instance_of("TypeError"));
    /// assert!(e.is_instance_of("Error"));
    /// assert!(!e.is_instance_of("RangeError"));
    /// ```
    pub fn error(class: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorValue {
            class: class.into(),
            message: message.into(),
        }))
    }

    /// Builds a pattern value. Invalid patterns are a programming error in the
    /// caller's test code, so they are reported through `Result`.
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Ok(Value::Pattern(Rc::new(Regex::new(source)?)))
    }

    /// Wraps a closure as a callable value.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Value> + 'static,
    {
        Value::Function(Function::new(f))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_spy(&self) -> Option<&Spy> {
        match self {
            Value::Spy(spy) => Some(spy),
            _ => None,
        }
    }

    /// Returns the run-time type tag, mirroring `typeof`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Function(_) | Value::Spy(_) => "function",
            Value::Null
            | Value::Sequence(_)
            | Value::Object(_)
            | Value::Date(_)
            | Value::Error(_)
            | Value::Pattern(_) => "object",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Value::Sequence(_) => Category::Sequence,
            Value::Text(_) => Category::Text,
            Value::Number(_) => Category::Numeric,
            Value::Object(_) => Category::Keyed,
            _ => Category::Other,
        }
    }

    /// Class membership. `Object` is the root of every heap value and
    /// `Error` the root of every error class.
    pub fn is_instance_of(&self, class: &str) -> bool {
        let own = match self {
            Value::Sequence(_) => "Array",
            Value::Date(_) => "Date",
            Value::Pattern(_) => "RegExp",
            Value::Function(_) | Value::Spy(_) => "Function",
            Value::Error(err) => {
                return class == err.class || class == "Error" || class == "Object";
            }
            Value::Object(obj) => {
                return class == "Object" || obj.class().as_deref() == Some(class);
            }
            _ => return false,
        };
        class == own || class == "Object"
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Strict equality: primitives by value, heap values by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Pattern(a), Value::Pattern(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Spy(a), Value::Spy(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Recursive structural comparison.
    ///
    /// Identical references and equal primitives pass, `null` never equals a
    /// non-null value, dates compare by instant, and otherwise both sides must
    /// share a category, the same own key set and structurally equal values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use trial::Value;
    /// use serde_json::json;
    /// let a = Value::from(json!({"a": 1, "b": [1, 2]}));
    /// let b = Value::from(json!({"b": [1, 2], "a": 1}));
    /// assert!(a.deep_eq(&b));
    /// ```
    pub fn deep_eq(&self, other: &Value) -> bool {
        if self.strict_eq(other) {
            return true;
        }
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Date(a), Value::Date(b)) => a.timestamp_millis() == b.timestamp_millis(),
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => a.deep_eq(b),
            (Value::Error(a), Value::Error(b)) => a.class == b.class && a.message == b.message,
            (Value::Pattern(a), Value::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }

    /// Renders the value with text quoted, for messages embedding nested data.
    pub fn repr(&self) -> String {
        match self {
            Value::Text(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }

    // ------------------------------------------------------------------------
    // Display formatting helpers
    // ------------------------------------------------------------------------

    fn fmt_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item.repr())?;
        }
        write!(f, "]")
    }

    fn fmt_object(f: &mut fmt::Formatter<'_>, obj: &Object) -> fmt::Result {
        let mut keys = obj.keys();
        keys.sort();
        write!(f, "{{")?;
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let value = obj.get(key).unwrap_or_default();
            write!(f, "{}: {}", key, value.repr())?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
            Value::Sequence(items) => Value::fmt_list(f, items),
            Value::Object(obj) => Value::fmt_object(f, obj),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Error(err) => write!(f, "{}", err),
            Value::Pattern(re) => write!(f, "/{}/", re.as_str()),
            Value::Function(_) => write!(f, "[function]"),
            Value::Spy(_) => write!(f, "[spy]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// `==` is structural equality.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.deep_eq(other)
    }
}

// ============================================================================
// HEAP VALUE TYPES
// ============================================================================

/// A thrown or constructed error: a class name plus a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub class: String,
    pub message: String,
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.class)
        } else {
            write!(f, "{}: {}", self.class, self.message)
        }
    }
}

#[derive(Default)]
struct ObjectData {
    class: Option<String>,
    fields: HashMap<String, Value>,
}

/// A shared, mutable keyed object. Cloning yields another handle to the
/// same object.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<ObjectData>>);

/// A non-owning handle to an [`Object`].
#[derive(Clone)]
pub struct WeakObject(Weak<RefCell<ObjectData>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an object that reports membership in `class`.
    pub fn with_class(class: impl Into<String>) -> Self {
        Object(Rc::new(RefCell::new(ObjectData {
            class: Some(class.into()),
            fields: HashMap::new(),
        })))
    }

    /// Builder-style field insertion.
    pub fn field(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn class(&self) -> Option<String> {
        self.0.borrow().class.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().fields.get(key).cloned()
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().fields.insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().fields.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    /// Invokes the callable stored under `member`.
    ///
    /// A missing or non-callable member throws a `TypeError` value.
    pub fn call(&self, member: &str, args: Vec<Value>) -> Result<Value, Value> {
        match self.get(member) {
            Some(Value::Function(f)) => f.call(&args),
            Some(Value::Spy(spy)) => Ok(spy.call(args)),
            Some(other) => Err(Value::error(
                "TypeError",
                format!("{} is not a function ({})", member, other.type_tag()),
            )),
            None => Err(Value::error(
                "TypeError",
                format!("{} is not a function (undefined)", member),
            )),
        }
    }

    fn deep_eq(&self, other: &Object) -> bool {
        let a = self.0.borrow();
        let b = other.0.borrow();
        if a.fields.len() != b.fields.len() {
            return false;
        }
        a.fields.iter().all(|(key, value)| match b.fields.get(key) {
            Some(theirs) => value.deep_eq(theirs),
            None => false,
        })
    }
}

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }
}

type NativeFn = dyn Fn(&[Value]) -> Result<Value, Value>;

/// A callable value. `Err` carries the thrown value.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Value> + 'static,
    {
        Function(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Value> {
        (self.0)(args)
    }

    /// Calls the function, converting a panic into a thrown `Error` value.
    pub fn call_catching(&self, args: &[Value]) -> Result<Value, Value> {
        let _quiet = QuietPanics::begin();
        match panic::catch_unwind(AssertUnwindSafe(|| self.call(args))) {
            Ok(result) => result,
            Err(payload) => {
                take_panic_location();
                Err(Value::error("Error", panic_message(payload.as_ref())))
            }
        }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

thread_local! {
    static QUIET_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// While held, panics on the current thread are caught silently: the hook
/// records their location instead of printing. Other threads keep the
/// previously installed hook.
pub(crate) struct QuietPanics {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl QuietPanics {
    pub(crate) fn begin() -> Self {
        PANIC_HOOK.call_once(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                if QUIET_DEPTH.with(Cell::get) > 0 {
                    let location = info.location().map(|l| l.to_string());
                    LAST_PANIC_LOCATION.with(|last| *last.borrow_mut() = location);
                } else {
                    previous(info);
                }
            }));
        });
        QUIET_DEPTH.with(|depth| depth.set(depth.get() + 1));
        QuietPanics {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        QUIET_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Where the most recent quietly caught panic on this thread happened.
pub(crate) fn take_panic_location() -> Option<String> {
    LAST_PANIC_LOCATION.with(|last| last.borrow_mut().take())
}

/// Extracts the human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize, f32);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::seq(items)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<&Object> for Value {
    fn from(obj: &Object) -> Self {
        Value::Object(obj.clone())
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Spy> for Value {
    fn from(spy: Spy) -> Self {
        Value::Spy(spy)
    }
}

impl From<&Spy> for Value {
    fn from(spy: &Spy) -> Self {
        Value::Spy(spy.clone())
    }
}

impl From<Regex> for Value {
    fn from(re: Regex) -> Self {
        Value::Pattern(Rc::new(re))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::seq(items),
            serde_json::Value::Object(map) => {
                let obj = Object::new();
                for (key, value) in map {
                    obj.set(key, Value::from(value));
                }
                Value::Object(obj)
            }
        }
    }
}

/// Builds a `Vec<Value>` from heterogeneous expressions.
///
/// ```rust
/// use trial::{values, Value};
/// let args: Vec<Value> = values!["a", 5];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($item:expr),+ $(,)?) => {
        vec![$($crate::Value::from($item)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_primitive_rules() {
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::seq(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn strict_equality_uses_identity_for_heap_values() {
        let a = Value::seq([1, 2]);
        let b = Value::seq([1, 2]);
        assert!(a.strict_eq(&a.clone()));
        assert!(!a.strict_eq(&b));
        assert!(a.deep_eq(&b));
    }

    #[test]
    fn display_sorts_object_keys() {
        let obj = Object::new().field("b", 2).field("a", "x");
        assert_eq!(Value::from(obj).to_string(), "{a: \"x\", b: 2}");
    }
}
