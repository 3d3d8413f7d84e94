//! Dynamic field values.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field map of a record or embedded object, ordered by field name.
pub type Fields = BTreeMap<String, Value>;

/// A field value.
///
/// Lists hold either primitives (null, bool, int, string) or objects, never a
/// mix and never other lists. [`Value::validate`] enforces this; every value
/// entering the store passes through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Absent or explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// UTF-8 string.
    String(String),
    /// Embedded object.
    Object(Fields),
    /// Homogeneous list.
    List(Vec<Value>),
}

pub(crate) static NULL: Value = Value::Null;

impl Value {
    /// Returns a short name for the value's type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::List(_) => "list",
        }
    }

    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for null, bool, int and string.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::String(_)
        )
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the embedded object, if this is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Fields> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Checks that the value can be stored.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for nested lists and lists mixing
    /// primitives with objects, at any depth.
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::String(_) => Ok(()),
            Self::Object(fields) => validate_fields(fields),
            Self::List(items) => {
                let mut objects = 0usize;
                for item in items {
                    match item {
                        Self::List(_) => {
                            return Err(CoreError::unsupported_type(
                                "lists cannot contain lists",
                            ))
                        }
                        Self::Object(fields) => {
                            validate_fields(fields)?;
                            objects += 1;
                        }
                        _ => {}
                    }
                }
                if objects != 0 && objects != items.len() {
                    return Err(CoreError::unsupported_type(
                        "lists must hold only primitives or only objects",
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Validates every value of a field map.
///
/// # Errors
///
/// Returns `UnsupportedType` naming the first offending field.
pub(crate) fn validate_fields(fields: &Fields) -> CoreResult<()> {
    for (name, value) in fields {
        value.validate().map_err(|err| match err {
            CoreError::UnsupportedType { message } => {
                CoreError::unsupported_type(format!("field '{name}': {message}"))
            }
            other => other,
        })?;
    }
    Ok(())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Self::Object(fields)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Primary key of a record: unique within its class, immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimaryKey {
    /// Integer key.
    Int(i64),
    /// String key.
    String(String),
}

impl PrimaryKey {
    /// Converts a field value into a key.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` unless the value is an integer or string.
    pub fn try_from_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::Int(n) => Ok(Self::Int(*n)),
            Value::String(s) => Ok(Self::String(s.clone())),
            other => Err(CoreError::unsupported_type(format!(
                "primary keys must be int or string, got {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<PrimaryKey> for Value {
    fn from(key: PrimaryKey) -> Self {
        match key {
            PrimaryKey::Int(n) => Self::Int(n),
            PrimaryKey::String(s) => Self::String(s),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for PrimaryKey {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}
