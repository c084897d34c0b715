//! # Value Type System
//!
//! Scalars stored in relation rows and the logic variables that reference them.
//!
//! ## Design Decisions
//!
//! - **Two kinds**: unsigned integers and strings. Rows are homogeneous per
//!   column; comparing values of different kinds is a [`EvalError::TypeMismatch`].
//! - **Equality is total**: two values of different kinds are simply unequal, so
//!   `Value` can key hash indexes. Only *ordering* is kind-restricted.
//! - **Variables are an enum**: a variable is either bound to a value or free
//!   with a name. A bound variable has no meaningful name.
//!
//! ## Usage
//!
//! ```rust
//! use stratalog::value::{Value, Variable};
//!
//! let row = vec![Value::from(1u64), Value::from("main")];
//! let x = Variable::free("X");
//! let one = Variable::bound(1u64);
//!
//! assert!(!x.is_bound());
//! assert_eq!(one.instantiation(), Some(&row[0]));
//! ```

use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One tuple of a relation. Fixed width per relation.
pub type Row = Vec<Value>;

/// Kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    UnsignedInt,
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::UnsignedInt => write!(f, "unsigned int"),
            ValueKind::String => write!(f, "string"),
        }
    }
}

/// A scalar stored in a relation row.
///
/// Serializes untagged: JSON numbers become `UnsignedInt`, JSON strings
/// become `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    UnsignedInt(u64),
    String(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::UnsignedInt(_) => ValueKind::UnsignedInt,
            Value::String(_) => ValueKind::String,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UnsignedInt(n) => Some(*n),
            Value::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::UnsignedInt(_) => None,
        }
    }

    /// Order two values of the same kind.
    ///
    /// Values of different kinds have no order and yield `TypeMismatch`.
    pub fn try_cmp(&self, other: &Value) -> EvalResult<Ordering> {
        match (self, other) {
            (Value::UnsignedInt(a), Value::UnsignedInt(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => Err(EvalError::TypeMismatch {
                left: self.clone(),
                right: other.clone(),
            }),
        }
    }

    /// Presentation order: integers before strings, then by value.
    ///
    /// Used to produce stable row listings. Not a semantic ordering; use
    /// [`Value::try_cmp`] for constraint evaluation.
    pub fn display_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::UnsignedInt(a), Value::UnsignedInt(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::UnsignedInt(_), Value::String(_)) => Ordering::Less,
            (Value::String(_), Value::UnsignedInt(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UnsignedInt(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UnsignedInt(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UnsignedInt(u64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Compare two rows column by column in presentation order.
pub fn display_cmp_rows(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.display_cmp(y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// A logic variable: bound to a value, or free and identified by name.
///
/// Equality follows the binding: two bound variables are equal iff their
/// values are, two free variables iff their names are, and a bound variable
/// never equals a free one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    #[serde(rename = "val")]
    Bound(Value),
    #[serde(rename = "var")]
    Free(String),
}

impl Variable {
    pub fn bound(value: impl Into<Value>) -> Self {
        Variable::Bound(value.into())
    }

    pub fn free(name: impl Into<String>) -> Self {
        Variable::Free(name.into())
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Variable::Bound(_))
    }

    /// Name of a free variable; `None` when bound.
    pub fn name(&self) -> Option<&str> {
        match self {
            Variable::Free(name) => Some(name),
            Variable::Bound(_) => None,
        }
    }

    /// Value of a bound variable; `None` when free.
    pub fn instantiation(&self) -> Option<&Value> {
        match self {
            Variable::Bound(value) => Some(value),
            Variable::Free(_) => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Bound(Value::String(s)) => write!(f, "{s:?}"),
            Variable::Bound(value) => write!(f, "{value}"),
            Variable::Free(name) => write!(f, "{name}"),
        }
    }
}
