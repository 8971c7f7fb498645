//! Provides a dynamic value type abstraction.
//!
//! This module gives access to a dynamically typed value which is used by
//! the template engine during execution.
//!
//! For the most part the existence of the value type can be ignored as
//! the engine converts everything that implements `Serialize` into a
//! [`Value`] automatically.  There are however two kinds of values which
//! cannot come through serde: functions and lambdas.
//!
//! # Functions
//!
//! A function ([`Value::from_function`]) is a computed value.  Whenever the
//! engine looks up a name and finds a function it invokes it and uses the
//! return value instead.  The function receives the current scope (the
//! receiver) as argument.  Inside a section that is the section's item;
//! for a dotted name it is the object the last segment was found on:
//!
//! ```
//! # use minimus::{context, Environment, value::Value};
//! let view = context! {
//!     first => "John",
//!     last => "Doe",
//!     full => Value::from_function(|this: &Value| {
//!         Ok(format!(
//!             "{} {}",
//!             this.get_attr("first").unwrap_or_default(),
//!             this.get_attr("last").unwrap_or_default(),
//!         ))
//!     }),
//! };
//! let env = Environment::new();
//! assert_eq!(env.render("{{full}}", view, ()).unwrap(), "John Doe");
//! ```
//!
//! # Lambdas
//!
//! A lambda ([`Value::from_lambda`]) turns a section into a text transform.
//! Instead of rendering the section body the engine hands the raw,
//! unrendered body to the lambda, together with a helper that can render
//! template source against the current context:
//!
//! ```
//! # use minimus::{context, Environment, value::Value};
//! let view = context! {
//!     name => "World",
//!     bold => Value::from_lambda(|call| {
//!         Ok(format!("<b>{}</b>", call.render(call.text())?))
//!     }),
//! };
//! let env = Environment::new();
//! assert_eq!(
//!     env.render("{{#bold}}Hi {{name}}.{{/bold}}", view, ()).unwrap(),
//!     "<b>Hi World.</b>"
//! );
//! ```
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::vm::LambdaCall;

pub use crate::value::serialize::serializing_for_value;

mod serialize;

/// The map type used by the engine.
///
/// Maps are ordered by key.
pub type ValueMap = BTreeMap<Arc<str>, Value>;

type FunctionFn = dyn Fn(&Value) -> Result<Value, Error> + Send + Sync + 'static;
type LambdaFn = dyn Fn(&LambdaCall<'_>) -> Result<Value, Error> + Send + Sync + 'static;

/// Describes the kind of value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueKind {
    /// The value is undefined
    Undefined,
    /// The value is the none singleton (`()`)
    None,
    /// The value is a [`bool`]
    Bool,
    /// The value is a number of a supported type.
    Number,
    /// The value is a string.
    String,
    /// The value is a sequence of other values.
    Seq,
    /// The value is a key/value mapping.
    Map,
    /// The value is a function computed on lookup.
    Function,
    /// The value is a section lambda.
    Lambda,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ValueKind::Undefined => "undefined",
            ValueKind::None => "none",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "map",
            ValueKind::Function => "function",
            ValueKind::Lambda => "lambda",
        })
    }
}

#[derive(Clone)]
pub(crate) enum ValueRepr {
    Undefined,
    None,
    Bool(bool),
    U64(u64),
    I64(i64),
    F64(f64),
    String(Arc<str>),
    Seq(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
    Function(Arc<FunctionFn>),
    Lambda(Arc<LambdaFn>),
}

/// Represents a dynamically typed value in the template engine.
#[derive(Clone)]
pub struct Value(pub(crate) ValueRepr);

impl Default for Value {
    fn default() -> Value {
        Value::UNDEFINED
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (ValueRepr::Undefined, ValueRepr::Undefined) => true,
            (ValueRepr::None, ValueRepr::None) => true,
            (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a == b,
            (ValueRepr::String(a), ValueRepr::String(b)) => a == b,
            (ValueRepr::Seq(a), ValueRepr::Seq(b)) => a == b,
            (ValueRepr::Map(a), ValueRepr::Map(b)) => a == b,
            (ValueRepr::Function(a), ValueRepr::Function(b)) => Arc::ptr_eq(a, b),
            (ValueRepr::Lambda(a), ValueRepr::Lambda(b)) => Arc::ptr_eq(a, b),
            _ => match (self.as_i128(), other.as_i128()) {
                (Some(a), Some(b)) => a == b,
                _ => match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                },
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ValueRepr::Undefined => f.write_str("undefined"),
            ValueRepr::None => f.write_str("none"),
            ValueRepr::Bool(val) => fmt::Debug::fmt(&val, f),
            ValueRepr::U64(val) => fmt::Debug::fmt(&val, f),
            ValueRepr::I64(val) => fmt::Debug::fmt(&val, f),
            ValueRepr::F64(val) => fmt::Debug::fmt(&val, f),
            ValueRepr::String(ref val) => fmt::Debug::fmt(val, f),
            ValueRepr::Seq(ref val) => f.debug_list().entries(val.iter()).finish(),
            ValueRepr::Map(ref val) => f.debug_map().entries(val.iter()).finish(),
            ValueRepr::Function(_) => f.write_str("<function>"),
            ValueRepr::Lambda(_) => f.write_str("<lambda>"),
        }
    }
}

/// Formats the value the way variable tags print it.
///
/// Absent values and callables print nothing, sequences print their
/// items separated by commas.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ValueRepr::Undefined
            | ValueRepr::None
            | ValueRepr::Function(_)
            | ValueRepr::Lambda(_) => Ok(()),
            ValueRepr::Bool(val) => fmt::Display::fmt(&val, f),
            ValueRepr::U64(val) => fmt::Display::fmt(&val, f),
            ValueRepr::I64(val) => fmt::Display::fmt(&val, f),
            ValueRepr::F64(val) => {
                if val.is_nan() {
                    f.write_str("NaN")
                } else if val.is_infinite() {
                    f.write_str(if val.is_sign_negative() {
                        "-Infinity"
                    } else {
                        "Infinity"
                    })
                } else if val == 0.0 {
                    f.write_str("0")
                } else {
                    fmt::Display::fmt(&val, f)
                }
            }
            ValueRepr::String(ref val) => f.write_str(val),
            ValueRepr::Seq(ref items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(","));
                    }
                    ok!(fmt::Display::fmt(item, f));
                }
                Ok(())
            }
            ValueRepr::Map(_) => f.write_str("[object]"),
        }
    }
}

impl Value {
    /// The undefined value.
    ///
    /// This is what a lookup of a missing name produces.
    pub const UNDEFINED: Value = Value(ValueRepr::Undefined);

    /// Creates a function value.
    ///
    /// The engine invokes the function whenever a name lookup resolves to
    /// it.  The argument is the receiver: the current scope for a plain
    /// name, the object the last segment was found on for a dotted path.
    /// The return value replaces the function in the template.
    pub fn from_function<F, R>(f: F) -> Value
    where
        F: Fn(&Value) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<Value>,
    {
        Value(ValueRepr::Function(Arc::new(move |this: &Value| {
            f(this).map(Into::into)
        })))
    }

    /// Creates a section lambda.
    ///
    /// When a section resolves to a lambda the section body is not rendered.
    /// Instead the lambda is invoked with a [`LambdaCall`] that carries the
    /// raw body source and the current scope.  The returned value is
    /// printed in place of the section, absent values print nothing.  The
    /// output of a lambda is not escaped.
    pub fn from_lambda<F, R>(f: F) -> Value
    where
        F: Fn(&LambdaCall<'_>) -> Result<R, Error> + Send + Sync + 'static,
        R: Into<Value>,
    {
        Value(ValueRepr::Lambda(Arc::new(move |call: &LambdaCall<'_>| {
            f(call).map(Into::into)
        })))
    }

    /// Returns the kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self.0 {
            ValueRepr::Undefined => ValueKind::Undefined,
            ValueRepr::None => ValueKind::None,
            ValueRepr::Bool(_) => ValueKind::Bool,
            ValueRepr::U64(_) | ValueRepr::I64(_) | ValueRepr::F64(_) => ValueKind::Number,
            ValueRepr::String(_) => ValueKind::String,
            ValueRepr::Seq(_) => ValueKind::Seq,
            ValueRepr::Map(_) => ValueKind::Map,
            ValueRepr::Function(_) => ValueKind::Function,
            ValueRepr::Lambda(_) => ValueKind::Lambda,
        }
    }

    /// Is this value true?
    ///
    /// `false`, zero, NaN, the empty string, none and undefined are false.
    /// Everything else (including empty sequences and maps) is true.
    pub fn is_true(&self) -> bool {
        match self.0 {
            ValueRepr::Bool(val) => val,
            ValueRepr::U64(x) => x != 0,
            ValueRepr::I64(x) => x != 0,
            ValueRepr::F64(x) => x != 0.0 && !x.is_nan(),
            ValueRepr::String(ref x) => !x.is_empty(),
            ValueRepr::None | ValueRepr::Undefined => false,
            ValueRepr::Seq(_)
            | ValueRepr::Map(_)
            | ValueRepr::Function(_)
            | ValueRepr::Lambda(_) => true,
        }
    }

    /// Returns `true` if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self.0, ValueRepr::Undefined)
    }

    /// Returns `true` if this value is none.
    pub fn is_none(&self) -> bool {
        matches!(self.0, ValueRepr::None)
    }

    /// Returns `true` if the value is none or undefined.
    pub fn is_absent(&self) -> bool {
        matches!(self.0, ValueRepr::None | ValueRepr::Undefined)
    }

    /// If the value is a string, return it.
    pub fn as_str(&self) -> Option<&str> {
        match self.0 {
            ValueRepr::String(ref s) => Some(s),
            _ => None,
        }
    }

    /// If the value is a sequence, return its items.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self.0 {
            ValueRepr::Seq(ref items) => Some(&items[..]),
            _ => None,
        }
    }

    /// If the value is a map, return it.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self.0 {
            ValueRepr::Map(ref map) => Some(map),
            _ => None,
        }
    }

    /// Returns the value as 64-bit float if it's a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self.0 {
            ValueRepr::U64(x) => Some(x as f64),
            ValueRepr::I64(x) => Some(x as f64),
            ValueRepr::F64(x) => Some(x),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self.0 {
            ValueRepr::U64(x) => Some(x as i128),
            ValueRepr::I64(x) => Some(x as i128),
            _ => None,
        }
    }

    /// Returns the length of sequences and maps.
    pub fn len(&self) -> Option<usize> {
        match self.0 {
            ValueRepr::Seq(ref items) => Some(items.len()),
            ValueRepr::Map(ref map) => Some(map.len()),
            ValueRepr::String(ref s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Looks up an attribute.
    ///
    /// Maps are indexed by key.  Sequences support decimal indexes and the
    /// `length` attribute.  All other values have no attributes.
    pub fn get_attr(&self, key: &str) -> Option<Value> {
        match self.0 {
            ValueRepr::Map(ref map) => map.get(key).cloned(),
            ValueRepr::Seq(ref items) => {
                if key == "length" {
                    Some(Value::from(items.len()))
                } else {
                    key.parse::<usize>()
                        .ok()
                        .and_then(|idx| items.get(idx))
                        .cloned()
                }
            }
            _ => None,
        }
    }

    pub(crate) fn as_function(&self) -> Option<&FunctionFn> {
        match self.0 {
            ValueRepr::Function(ref f) => Some(&**f),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($src:ty, $dst:ident) => {
        impl From<$src> for Value {
            #[inline(always)]
            fn from(val: $src) -> Self {
                Value(ValueRepr::$dst(val as _))
            }
        }
    };
}

value_from!(bool, Bool);
value_from!(u8, U64);
value_from!(u16, U64);
value_from!(u32, U64);
value_from!(u64, U64);
value_from!(usize, U64);
value_from!(i8, I64);
value_from!(i16, I64);
value_from!(i32, I64);
value_from!(i64, I64);
value_from!(isize, I64);
value_from!(f32, F64);
value_from!(f64, F64);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value(ValueRepr::None)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value(ValueRepr::String(Arc::from(val)))
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value(ValueRepr::String(Arc::from(val)))
    }
}

impl From<Arc<str>> for Value {
    fn from(val: Arc<str>) -> Self {
        Value(ValueRepr::String(val))
    }
}

impl From<char> for Value {
    fn from(val: char) -> Self {
        Value::from(val.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        match val {
            Some(val) => val.into(),
            None => Value(ValueRepr::None),
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Self {
        Value(ValueRepr::Seq(Arc::new(
            val.into_iter().map(Into::into).collect(),
        )))
    }
}

impl From<ValueMap> for Value {
    fn from(val: ValueMap) -> Self {
        Value(ValueRepr::Map(Arc::new(val)))
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(val: BTreeMap<String, T>) -> Self {
        Value::from(
            val.into_iter()
                .map(|(k, v)| (Arc::from(k), v.into()))
                .collect::<ValueMap>(),
        )
    }
}

impl<'a, T: Into<Value>> From<BTreeMap<&'a str, T>> for Value {
    fn from(val: BTreeMap<&'a str, T>) -> Self {
        Value::from(
            val.into_iter()
                .map(|(k, v)| (Arc::from(k), v.into()))
                .collect::<ValueMap>(),
        )
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Value(ValueRepr::Seq(Arc::new(
            iter.into_iter().map(Into::into).collect(),
        )))
    }
}
