//! # Assertion Engine
//!
//! `expect(actual)` returns an [`Expectation`] whose matchers evaluate one
//! predicate each and return `Err(Failure)` when it does not hold. The
//! default message embeds the actual and expected values; `expect_with`
//! replaces it with the caller's message. Usage errors (a matcher applied to
//! a value outside the categories it understands) are raised the same way,
//! always with their own message.
//!
//! Matchers dispatch on [`Category`]: sequence, text, numeric, keyed object,
//! and everything else.
//!
//! ```rust
//! use trial::{expect, values, Spy, Value};
//! # fn main() -> Result<(), trial::Failure> {
//! expect(10).to_include(5)?;
//! expect("hello").to_include("ell")?;
//! let spy = Spy::new().returns("x");
//! assert_eq!(spy.call(values!["a", 5]).to_string(), "x");
//! expect(&spy).to_have_been_called_with(values!["a", 5])?;
//! # Ok(())
//! # }
//! ```

use crate::errors::Failure;
use crate::value::{Category, Value};

/// Starts an expectation on `actual`.
pub fn expect(actual: impl Into<Value>) -> Expectation {
    Expectation {
        actual: actual.into(),
        message: None,
    }
}

/// Starts an expectation whose failures report `message`.
pub fn expect_with(actual: impl Into<Value>, message: impl Into<String>) -> Expectation {
    Expectation {
        actual: actual.into(),
        message: Some(message.into()),
    }
}

/// The argument of a type check: a run-time type tag or a class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeCheck {
    Tag(String),
    Class(String),
}

/// A class name, for [`Expectation::to_be_a`] and the throw matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Class<'a>(pub &'a str);

impl From<&str> for TypeCheck {
    fn from(tag: &str) -> Self {
        TypeCheck::Tag(tag.to_string())
    }
}

impl From<Class<'_>> for TypeCheck {
    fn from(class: Class<'_>) -> Self {
        TypeCheck::Class(class.0.to_string())
    }
}

/// What a thrown value is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrowMatch {
    /// Substring of the thrown message (or of thrown text).
    Message(String),
    /// Class membership of the thrown value.
    Class(String),
}

impl From<&str> for ThrowMatch {
    fn from(message: &str) -> Self {
        ThrowMatch::Message(message.to_string())
    }
}

impl From<Class<'_>> for ThrowMatch {
    fn from(class: Class<'_>) -> Self {
        ThrowMatch::Class(class.0.to_string())
    }
}

impl std::fmt::Display for ThrowMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrowMatch::Message(m) => write!(f, "{}", m),
            ThrowMatch::Class(c) => write!(f, "{}", c),
        }
    }
}

impl ThrowMatch {
    fn matches(&self, thrown: &Value) -> bool {
        match (self, thrown) {
            (ThrowMatch::Message(m), Value::Text(text)) => text.contains(m.as_str()),
            (ThrowMatch::Message(m), Value::Error(err)) => err.message.contains(m.as_str()),
            (ThrowMatch::Message(m), other) => other.to_string().contains(m.as_str()),
            (ThrowMatch::Class(_), Value::Text(_)) => false,
            (ThrowMatch::Class(c), other) => other.is_instance_of(c),
        }
    }
}

/// The matcher object returned by [`expect`].
#[derive(Debug, Clone)]
pub struct Expectation {
    actual: Value,
    message: Option<String>,
}

impl Expectation {
    pub fn actual(&self) -> &Value {
        &self.actual
    }

    // ------------------------------------------------------------------------
    // Equality
    // ------------------------------------------------------------------------

    /// Strict equality: primitives by value, heap values by identity.
    #[track_caller]
    pub fn to_equal(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let expected = expected.into();
        self.check(self.actual.strict_eq(&expected), || {
            format!("{} is not equal to {}", self.actual, expected)
        })
    }

    #[track_caller]
    pub fn to_deep_equal(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let expected = expected.into();
        self.check(self.actual.deep_eq(&expected), || {
            format!(
                "{} is not deep equal to {}",
                self.actual.repr(),
                expected.repr()
            )
        })
    }

    #[track_caller]
    pub fn to_not_deep_equal(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let expected = expected.into();
        self.check(!self.actual.deep_eq(&expected), || {
            format!(
                "{} is deep equal to {} but shouldn't",
                self.actual.repr(),
                expected.repr()
            )
        })
    }

    // ------------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------------

    /// Element, substring, divisibility or truthy key, by category.
    #[track_caller]
    pub fn to_include(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let expected = expected.into();
        let included = self.includes(&expected)?;
        self.check(included, || {
            format!("{} does not contain {}", self.actual, expected)
        })
    }

    /// Negation of [`Expectation::to_include`]; for keyed objects the key
    /// must be absent or `undefined`.
    #[track_caller]
    pub fn to_not_include(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let expected = expected.into();
        let excluded = match &self.actual {
            Value::Object(obj) => obj
                .get(&expected.to_string())
                .map_or(true, |v| v.is_undefined()),
            _ => !self.includes(&expected)?,
        };
        self.check(excluded, || {
            format!("{} does contain {}", self.actual, expected)
        })
    }

    #[track_caller]
    fn includes(&self, expected: &Value) -> Result<bool, Failure> {
        match (&self.actual, self.actual.category()) {
            (Value::Sequence(items), Category::Sequence) => {
                Ok(items.iter().any(|item| item.strict_eq(expected)))
            }
            (Value::Text(text), Category::Text) => Ok(text.contains(&expected.to_string())),
            (Value::Number(n), Category::Numeric) => match expected.as_number() {
                Some(divisor) => Ok(n % divisor == 0.0),
                None => Err(Failure::usage(format!(
                    "Expected a number to divide {}, got {} ({})",
                    n,
                    expected,
                    expected.type_tag()
                ))),
            },
            (Value::Object(obj), Category::Keyed) => Ok(obj
                .get(&expected.to_string())
                .is_some_and(|v| v.is_truthy())),
            (other, _) => Err(Failure::usage(format!(
                "Unexpected type for {} ({})",
                other,
                other.type_tag()
            ))),
        }
    }

    // ------------------------------------------------------------------------
    // Booleans, types, existence
    // ------------------------------------------------------------------------

    #[track_caller]
    pub fn to_be_true(&self) -> Result<(), Failure> {
        self.check(matches!(self.actual, Value::Bool(true)), || {
            format!("{} is not true", self.actual)
        })
    }

    #[track_caller]
    pub fn to_be_false(&self) -> Result<(), Failure> {
        self.check(matches!(self.actual, Value::Bool(false)), || {
            format!("{} is not false", self.actual)
        })
    }

    /// `"number"`-style tags check the type tag; [`Class`] checks membership.
    #[track_caller]
    pub fn to_be_a(&self, expected: impl Into<TypeCheck>) -> Result<(), Failure> {
        let expected = expected.into();
        let (holds, wanted) = match &expected {
            TypeCheck::Tag(tag) => (self.actual.type_tag() == tag, tag),
            TypeCheck::Class(class) => (self.actual.is_instance_of(class), class),
        };
        self.check(holds, || {
            format!(
                "{} is a {}, but not a {}",
                self.actual,
                self.actual.type_tag(),
                wanted
            )
        })
    }

    #[track_caller]
    pub fn to_exist(&self) -> Result<(), Failure> {
        self.check(self.actual.is_truthy(), || {
            format!("{} does not exist", self.actual)
        })
    }

    #[track_caller]
    pub fn to_not_exist(&self) -> Result<(), Failure> {
        self.check(!self.actual.is_truthy(), || {
            format!("{} does exist", self.actual)
        })
    }

    // ------------------------------------------------------------------------
    // Emptiness
    // ------------------------------------------------------------------------

    #[track_caller]
    pub fn to_be_empty(&self) -> Result<(), Failure> {
        let size = self.size()?;
        self.check(size == 0, || format!("{} is not empty", self.actual))
    }

    #[track_caller]
    pub fn to_not_be_empty(&self) -> Result<(), Failure> {
        let size = self.size()?;
        self.check(size != 0, || format!("{} is empty", self.actual))
    }

    #[track_caller]
    fn size(&self) -> Result<usize, Failure> {
        match &self.actual {
            Value::Sequence(items) => Ok(items.len()),
            Value::Text(text) => Ok(text.chars().count()),
            Value::Object(obj) => Ok(obj.len()),
            other => Err(Failure::usage(format!(
                "Unexpected type for {} ({})",
                other,
                other.type_tag()
            ))),
        }
    }

    // ------------------------------------------------------------------------
    // Throwing
    // ------------------------------------------------------------------------

    /// The callable must throw (return `Err` or panic).
    #[track_caller]
    pub fn to_throw(&self) -> Result<(), Failure> {
        self.throws(None)
    }

    /// The callable must throw a value matching `expected`.
    #[track_caller]
    pub fn to_throw_matching(&self, expected: impl Into<ThrowMatch>) -> Result<(), Failure> {
        self.throws(Some(expected.into()))
    }

    /// The callable must not throw at all.
    #[track_caller]
    pub fn to_not_throw(&self) -> Result<(), Failure> {
        self.does_not_throw(None)
    }

    /// The callable may throw, but not a value matching `excluded`.
    #[track_caller]
    pub fn to_not_throw_matching(&self, excluded: impl Into<ThrowMatch>) -> Result<(), Failure> {
        self.does_not_throw(Some(excluded.into()))
    }

    #[track_caller]
    fn throws(&self, expected: Option<ThrowMatch>) -> Result<(), Failure> {
        let Err(thrown) = self.invoke()? else {
            return Err(self.fail(match &expected {
                Some(expected) => format!("did not throw {}", expected),
                None => "did not throw".to_string(),
            }));
        };
        match expected {
            None => Ok(()),
            Some(expected) => self.check(expected.matches(&thrown), || {
                format!("Expected exception thrown: {}, expected {}", thrown, expected)
            }),
        }
    }

    #[track_caller]
    fn does_not_throw(&self, excluded: Option<ThrowMatch>) -> Result<(), Failure> {
        let Err(thrown) = self.invoke()? else {
            return Ok(());
        };
        match excluded {
            None => Err(self.fail(format!(
                "Did not expect an exception thrown, got {}",
                thrown
            ))),
            Some(excluded) => self.check(!excluded.matches(&thrown), || {
                format!(
                    "Expected exception not thrown: {}, expected {}",
                    thrown, excluded
                )
            }),
        }
    }

    #[track_caller]
    fn invoke(&self) -> Result<Result<Value, Value>, Failure> {
        match &self.actual {
            Value::Function(f) => Ok(f.call_catching(&[])),
            Value::Spy(spy) => Ok(Ok(spy.call(Vec::new()))),
            _ => Err(Failure::usage("Input needs to be a function")),
        }
    }

    // ------------------------------------------------------------------------
    // Ordering and patterns
    // ------------------------------------------------------------------------

    #[track_caller]
    pub fn to_be_less_than(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let (actual, expected) = self.numbers(expected.into())?;
        self.check(actual < expected, || {
            format!("Expected {} to be less than {}", self.actual, expected)
        })
    }

    #[track_caller]
    pub fn to_be_greater_than(&self, expected: impl Into<Value>) -> Result<(), Failure> {
        let (actual, expected) = self.numbers(expected.into())?;
        self.check(actual > expected, || {
            format!("Expected {} to be greater than {}", self.actual, expected)
        })
    }

    #[track_caller]
    fn numbers(&self, expected: Value) -> Result<(f64, f64), Failure> {
        match (self.actual.as_number(), expected.as_number()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(Failure::usage(format!(
                "{} and {} need to be numbers",
                self.actual, expected
            ))),
        }
    }

    #[track_caller]
    pub fn to_match(&self, pattern: impl Into<Value>) -> Result<(), Failure> {
        let (text, matched, pattern) = self.pattern_match(pattern.into())?;
        self.check(matched, || format!("{} does not match {}", text, pattern))
    }

    #[track_caller]
    pub fn to_not_match(&self, pattern: impl Into<Value>) -> Result<(), Failure> {
        let (text, matched, pattern) = self.pattern_match(pattern.into())?;
        self.check(!matched, || {
            format!("{} does match {}, but shouldn't", text, pattern)
        })
    }

    #[track_caller]
    fn pattern_match(&self, pattern: Value) -> Result<(&str, bool, Value), Failure> {
        let Some(text) = self.actual.as_text() else {
            return Err(Failure::usage(format!("{} needs to be a string", self.actual)));
        };
        let Value::Pattern(re) = &pattern else {
            return Err(Failure::usage(format!(
                "{} needs to be a regular expression",
                pattern
            )));
        };
        let matched = re.is_match(text);
        Ok((text, matched, pattern))
    }

    // ------------------------------------------------------------------------
    // Spies
    // ------------------------------------------------------------------------

    /// The spy was called at least once.
    #[track_caller]
    pub fn to_have_been_called(&self) -> Result<(), Failure> {
        let calls = self.spy_calls()?;
        self.check(calls > 0, || "spy was not called".to_string())
    }

    /// The spy was called exactly `times` times.
    #[track_caller]
    pub fn to_have_been_called_times(&self, times: usize) -> Result<(), Failure> {
        let calls = self.spy_calls()?;
        self.check(calls == times, || {
            format!("spy was not called {} times (called {})", times, calls)
        })
    }

    /// Every given argument appears somewhere in the spy's last call.
    #[track_caller]
    pub fn to_have_been_called_with(&self, args: Vec<Value>) -> Result<(), Failure> {
        let Some(spy) = self.actual.as_spy() else {
            return Err(Failure::usage(format!("{} is not a spy", self.actual)));
        };
        let last = spy.last_args();
        let all_present = args
            .iter()
            .all(|arg| last.iter().any(|seen| seen.strict_eq(arg)));
        self.check(all_present, || {
            let listed: Vec<String> = args.iter().map(ToString::to_string).collect();
            format!("Expected spy to be called with {}", listed.join(", "))
        })
    }

    #[track_caller]
    fn spy_calls(&self) -> Result<usize, Failure> {
        match self.actual.as_spy() {
            Some(spy) => Ok(spy.call_count()),
            None => Err(Failure::usage(format!("{} is not a spy", self.actual))),
        }
    }

    // ------------------------------------------------------------------------
    // Failure construction
    // ------------------------------------------------------------------------

    #[track_caller]
    fn check(&self, holds: bool, default: impl FnOnce() -> String) -> Result<(), Failure> {
        if holds {
            Ok(())
        } else {
            Err(self.fail(default()))
        }
    }

    #[track_caller]
    fn fail(&self, default: String) -> Failure {
        Failure::assertion(self.message.clone().unwrap_or(default))
    }
}
