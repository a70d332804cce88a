//! The dynamically shaped payload type walked by the extractor.
//!
//! Database columns and decoded property lists both land in [`Value`].

use std::borrow::Cow;
use std::collections::BTreeMap;

/// A leaf that can be rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    /// Textual form used for URL scanning. `Null` has none.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(Cow::Owned(b.to_string())),
            Scalar::Int(i) => Some(Cow::Owned(i.to_string())),
            Scalar::Real(r) => Some(Cow::Owned(r.to_string())),
            Scalar::Text(s) => Some(Cow::Borrowed(s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Bytes(Vec<u8>),
    /// Ordered list-like values, including fixed-size row tuples.
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    /// Unordered, unique members. Built through [`Value::set`].
    Set(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Text(s.into()))
    }

    pub fn int(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }

    /// Builds a set-like value, collapsing members that compare equal.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    /// Text form of a scalar leaf; `None` for containers, bytes, and null.
    pub fn scalar_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Scalar(s) => s.as_text(),
            _ => None,
        }
    }

    /// Short variant label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(Scalar::Null) => "null",
            Value::Scalar(Scalar::Bool(_)) => "bool",
            Value::Scalar(Scalar::Int(_)) => "integer",
            Value::Scalar(Scalar::Real(_)) => "real",
            Value::Scalar(Scalar::Text(_)) => "text",
            Value::Bytes(_) => "bytes",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Set(_) => "set",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}
