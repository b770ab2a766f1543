use serde::{Deserialize, Serialize};

use crate::ExpressionValue;

/// A single value stored in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    /// A yes/no answer.
    Bool(bool),

    /// A numeric answer.
    Number(f64),

    /// A free-text answer, or the key of a single chosen option.
    String(String),

    /// The keys of chosen options (multiple choice).
    Keys(Vec<String>),
}

impl ResponseValue {
    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get this value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&ResponseValue> for ExpressionValue {
    fn from(value: &ResponseValue) -> Self {
        match value {
            ResponseValue::Bool(b) => Self::Boolean(*b),
            ResponseValue::Number(n) => Self::Number(*n),
            ResponseValue::String(s) => Self::String(s.clone()),
            ResponseValue::Keys(keys) => Self::StringArray(keys.clone()),
        }
    }
}

impl From<String> for ResponseValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ResponseValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for ResponseValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for ResponseValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for ResponseValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for ResponseValue {
    fn from(keys: Vec<String>) -> Self {
        Self::Keys(keys)
    }
}

impl From<Vec<&str>> for ResponseValue {
    fn from(keys: Vec<&str>) -> Self {
        Self::Keys(keys.into_iter().map(str::to_string).collect())
    }
}
