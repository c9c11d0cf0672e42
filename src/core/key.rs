use crate::core::{Result, UowError, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity scalar of a persisted row.
///
/// Stable and unique within a table; used as the storage row key and as the
/// key half of an `EntityId`. Only hashable value kinds are allowed here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKey {
    Int(i64),
    Text(String),
}

impl EntityKey {
    /// Build a key from an attribute value.
    ///
    /// # Errors
    /// Returns `TypeMismatch` for value kinds that cannot serve as identity.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(Self::Int(*i)),
            Value::Text(s) => Ok(Self::Text(s.clone())),
            other => Err(UowError::TypeMismatch(format!(
                "{} cannot be used as an identity key",
                other.type_name()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::Integer(*i),
            Self::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for EntityKey {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
