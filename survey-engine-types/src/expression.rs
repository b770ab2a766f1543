use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Separator between an item key and a slot key in a response variable reference.
///
/// Full keys never contain empty segments, so three dots cannot occur inside one.
pub const SLOT_SEPARATOR: &str = "...";

/// A conditional expression attached to a survey item.
///
/// The engine never interprets expressions itself; it hands them to an
/// evaluator together with the current response state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expression {
    /// A literal value.
    Const { value: ExpressionValue },

    /// The response to an item, or one slot of it.
    #[serde(rename_all = "camelCase")]
    ResponseVariable { variable_ref: String },

    /// A value from the engine context (locale, participant flags, custom values).
    #[serde(rename_all = "camelCase")]
    ContextVariable {
        context_type: ContextVariableType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },

    /// A named function applied to argument expressions.
    #[serde(rename_all = "camelCase")]
    Function {
        function_name: String,
        #[serde(default)]
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// A literal expression.
    pub fn constant(value: impl Into<ExpressionValue>) -> Self {
        Self::Const {
            value: value.into(),
        }
    }

    /// A reference to an item's response value, e.g. `"survey.q1"`.
    pub fn response(variable_ref: impl Into<String>) -> Self {
        Self::ResponseVariable {
            variable_ref: variable_ref.into(),
        }
    }

    /// A reference to one slot of an item's response, e.g. `"survey.q1...other"`.
    pub fn response_slot(item_key: &str, slot_key: &str) -> Self {
        Self::response(format!("{item_key}{SLOT_SEPARATOR}{slot_key}"))
    }

    /// A reference to an engine context value.
    pub fn context(context_type: ContextVariableType, key: Option<&str>) -> Self {
        Self::ContextVariable {
            context_type,
            key: key.map(str::to_string),
        }
    }

    /// A function call.
    pub fn function(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Self::Function {
            function_name: name.into(),
            arguments,
        }
    }
}

/// Which part of the engine context a context variable reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextVariableType {
    Locale,
    ParticipantFlag,
    CustomValue,
}

/// A parsed response variable reference: an item key and an optional slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableRef<'a> {
    pub item_key: &'a str,
    pub slot_key: Option<&'a str>,
}

impl<'a> VariableRef<'a> {
    /// Split `"item.key...slot"` into its parts.
    pub fn parse(variable_ref: &'a str) -> Self {
        match variable_ref.split_once(SLOT_SEPARATOR) {
            Some((item_key, slot_key)) => Self {
                item_key,
                slot_key: Some(slot_key),
            },
            None => Self {
                item_key: variable_ref,
                slot_key: None,
            },
        }
    }
}

/// The declared type of an expression result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpressionType {
    String,
    Number,
    Boolean,
    Date,
    StringArray,
    NumberArray,
    BooleanArray,
    DateArray,
}

/// A value produced by (or fed into) an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ExpressionValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    StringArray(Vec<String>),
    NumberArray(Vec<f64>),
    BooleanArray(Vec<bool>),
    DateArray(Vec<DateTime<Utc>>),
}

impl ExpressionValue {
    /// The type tag of this value.
    pub fn expression_type(&self) -> ExpressionType {
        match self {
            Self::String(_) => ExpressionType::String,
            Self::Number(_) => ExpressionType::Number,
            Self::Boolean(_) => ExpressionType::Boolean,
            Self::Date(_) => ExpressionType::Date,
            Self::StringArray(_) => ExpressionType::StringArray,
            Self::NumberArray(_) => ExpressionType::NumberArray,
            Self::BooleanArray(_) => ExpressionType::BooleanArray,
            Self::DateArray(_) => ExpressionType::DateArray,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Convert this value to `target`, if a sensible conversion exists.
    ///
    /// Numbers and dates convert through unix seconds; strings parse as
    /// numbers, `true`/`false`, or RFC 3339 dates. A scalar converts to a
    /// single-element array of the matching element type.
    pub fn cast(&self, target: ExpressionType) -> Option<ExpressionValue> {
        if self.expression_type() == target {
            return Some(self.clone());
        }
        match target {
            ExpressionType::String => match self {
                Self::Number(n) => Some(Self::String(format_number(*n))),
                Self::Boolean(b) => Some(Self::String(b.to_string())),
                Self::Date(d) => Some(Self::String(d.to_rfc3339())),
                _ => None,
            },
            ExpressionType::Number => match self {
                Self::String(s) => s.trim().parse().ok().map(Self::Number),
                Self::Boolean(b) => Some(Self::Number(if *b { 1.0 } else { 0.0 })),
                Self::Date(d) => Some(Self::Number(d.timestamp() as f64)),
                _ => None,
            },
            ExpressionType::Boolean => match self {
                Self::Number(n) => Some(Self::Boolean(*n != 0.0)),
                Self::String(s) => match s.as_str() {
                    "true" => Some(Self::Boolean(true)),
                    "false" => Some(Self::Boolean(false)),
                    _ => None,
                },
                _ => None,
            },
            ExpressionType::Date => match self {
                Self::Number(n) => date_from_timestamp(*n).map(Self::Date),
                Self::String(s) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|d| Self::Date(d.with_timezone(&Utc))),
                _ => None,
            },
            ExpressionType::StringArray => match self.cast(ExpressionType::String)? {
                Self::String(s) => Some(Self::StringArray(vec![s])),
                _ => None,
            },
            ExpressionType::NumberArray => match self.cast(ExpressionType::Number)? {
                Self::Number(n) => Some(Self::NumberArray(vec![n])),
                _ => None,
            },
            ExpressionType::BooleanArray => match self.cast(ExpressionType::Boolean)? {
                Self::Boolean(b) => Some(Self::BooleanArray(vec![b])),
                _ => None,
            },
            ExpressionType::DateArray => match self.cast(ExpressionType::Date)? {
                Self::Date(d) => Some(Self::DateArray(vec![d])),
                _ => None,
            },
        }
    }
}

/// Interpret `secs` as unix seconds. Fractions are truncated.
pub fn date_from_timestamp(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_opt(secs.trunc() as i64, 0).single()
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::StringArray(v) => write!(f, "[{}]", v.join(", ")),
            Self::NumberArray(v) => {
                let parts: Vec<_> = v.iter().map(|n| format_number(*n)).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::BooleanArray(v) => {
                let parts: Vec<_> = v.iter().map(bool::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::DateArray(v) => {
                let parts: Vec<_> = v.iter().map(DateTime::to_rfc3339).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<String> for ExpressionValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ExpressionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for ExpressionValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for ExpressionValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for ExpressionValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for ExpressionValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for ExpressionValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl From<Vec<String>> for ExpressionValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringArray(v)
    }
}

/// A template value resolved to its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub value: ExpressionValue,
}

impl TypedValue {
    pub fn new(value: ExpressionValue) -> Self {
        Self { value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expression_json_shape() {
        let expr = Expression::function(
            "and",
            vec![
                Expression::constant(true),
                Expression::response_slot("survey.q1", "other"),
            ],
        );
        let value = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "function",
                "functionName": "and",
                "arguments": [
                    { "type": "const", "value": { "type": "boolean", "value": true } },
                    { "type": "responseVariable", "variableRef": "survey.q1...other" }
                ]
            })
        );
        let back: Expression = serde_json::from_value(value).unwrap();
        assert_eq!(back, expr);
    }

    #[test]
    fn variable_ref_parts() {
        let plain = VariableRef::parse("survey.q1");
        assert_eq!(plain.item_key, "survey.q1");
        assert_eq!(plain.slot_key, None);

        let slot = VariableRef::parse("survey.q1...other");
        assert_eq!(slot.item_key, "survey.q1");
        assert_eq!(slot.slot_key, Some("other"));
    }

    #[test]
    fn cast_between_scalars() {
        let n = ExpressionValue::Number(42.0);
        assert_eq!(
            n.cast(ExpressionType::String),
            Some(ExpressionValue::String("42".into()))
        );
        assert_eq!(
            ExpressionValue::from("3.5").cast(ExpressionType::Number),
            Some(ExpressionValue::Number(3.5))
        );
        assert_eq!(
            ExpressionValue::from("nope").cast(ExpressionType::Number),
            None
        );
        assert_eq!(
            ExpressionValue::Number(0.0).cast(ExpressionType::Boolean),
            Some(ExpressionValue::Boolean(false))
        );
    }

    #[test]
    fn cast_number_to_date() {
        let date = ExpressionValue::Number(1_704_067_200.0)
            .cast(ExpressionType::Date)
            .unwrap();
        assert_eq!(
            date.as_date().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn cast_scalar_to_array() {
        assert_eq!(
            ExpressionValue::from("a").cast(ExpressionType::StringArray),
            Some(ExpressionValue::StringArray(vec!["a".into()]))
        );
        assert_eq!(
            ExpressionValue::StringArray(vec![]).cast(ExpressionType::Number),
            None
        );
    }
}
