//! The expression evaluation port and a basic evaluator.
//!
//! The engine never interprets expressions itself. Every condition, validation
//! and template value is handed to an [`ExpressionEvaluator`] together with an
//! [`EvalContext`] describing where it is evaluated.

use std::cmp::Ordering;

use survey_engine_types::{
    ContextVariableType, Expression, ExpressionValue, ResponseItem, SurveyItemKey, VariableRef,
    date_from_timestamp,
};

use crate::{ResponseStore, SurveyContext};

/// Error type for expression evaluation.
///
/// The engine never propagates these out of a lookup: they are logged and the
/// affected value falls back to a safe default.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionEvaluationError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function '{function}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        function: String,
        expected: &'static str,
        actual: usize,
    },

    #[error("Type mismatch in '{function}': expected {expected}, got {actual}")]
    TypeMismatch {
        function: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Failure reported by an injected evaluator.
    #[error("Evaluator error: {0}")]
    Custom(#[from] anyhow::Error),
}

impl ExpressionEvaluationError {
    /// Create a custom error from any error type.
    pub fn custom(err: impl Into<anyhow::Error>) -> Self {
        Self::Custom(err.into())
    }
}

/// Everything an evaluator may read while evaluating one expression.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Read-only view of the current responses.
    pub responses: &'a ResponseStore,

    /// The item the expression belongs to.
    pub item_key: &'a SurveyItemKey,

    /// The component the expression belongs to, for component-level conditions.
    pub component_key: Option<&'a str>,

    /// Engine-level context.
    pub context: &'a SurveyContext,
}

impl EvalContext<'_> {
    /// The response stored for an item, if the item exists and was answered.
    pub fn response_item(&self, item_key: &str) -> Option<&ResponseItem> {
        self.responses.response_item(item_key)
    }

    /// Resolve a response variable reference (`"item.key"` or `"item.key...slot"`).
    ///
    /// Returns `Ok(None)` for unanswered items and missing slots, and an error
    /// for items that do not exist.
    pub fn resolve_response_variable(
        &self,
        variable_ref: &str,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
        let reference = VariableRef::parse(variable_ref);
        if !self.responses.contains(reference.item_key) {
            return Err(ExpressionEvaluationError::InvalidReference(
                variable_ref.to_string(),
            ));
        }
        let Some(response) = self.response_item(reference.item_key) else {
            return Ok(None);
        };
        let value = match reference.slot_key {
            Some(slot) => response.slot(slot),
            None => response.value.as_ref(),
        };
        Ok(value.map(ExpressionValue::from))
    }
}

/// Evaluates expressions against the current response state.
///
/// `Ok(None)` means the expression is undefined (e.g. reads an unanswered item).
pub trait ExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &Expression,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&Expression, &EvalContext<'_>) -> Result<Option<ExpressionValue>, ExpressionEvaluationError>,
{
    fn evaluate(
        &self,
        expression: &Expression,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
        self(expression, ctx)
    }
}

/// A small evaluator covering common survey logic.
///
/// Functions:
/// - `and`, `or`, `not` - boolean logic; undefined operands count as `false`
/// - `eq` - equality of two values of the same type
/// - `lt`, `lte`, `gt`, `gte` - ordering of numbers, strings or dates
/// - `isDefined` - whether the operand is defined
/// - `hasResponse(itemKey)` - whether an item has been answered
/// - `responseHasKeysAny(value, keys...)`, `responseHasKeysAll(value, keys...)` -
///   option key checks on a selection
/// - `dateFromTimestamp(secs)` - unix seconds to date
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEvaluator;

impl ExpressionEvaluator for BasicEvaluator {
    fn evaluate(
        &self,
        expression: &Expression,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
        match expression {
            Expression::Const { value } => Ok(Some(value.clone())),
            Expression::ResponseVariable { variable_ref } => {
                ctx.resolve_response_variable(variable_ref)
            }
            Expression::ContextVariable { context_type, key } => {
                resolve_context_variable(*context_type, key.as_deref(), ctx)
            }
            Expression::Function {
                function_name,
                arguments,
            } => self.call(function_name, arguments, ctx),
        }
    }
}

impl BasicEvaluator {
    fn call(
        &self,
        name: &str,
        args: &[Expression],
        ctx: &EvalContext<'_>,
    ) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
        let result = match name {
            "and" => {
                for arg in args {
                    if !self.eval_flag(name, arg, ctx)? {
                        return Ok(Some(false.into()));
                    }
                }
                true
            }
            "or" => {
                for arg in args {
                    if self.eval_flag(name, arg, ctx)? {
                        return Ok(Some(true.into()));
                    }
                }
                false
            }
            "not" => {
                let [arg] = expect_args::<1>(name, args)?;
                !self.eval_flag(name, arg, ctx)?
            }
            "isDefined" => {
                let [arg] = expect_args::<1>(name, args)?;
                self.evaluate(arg, ctx)?.is_some()
            }
            "eq" => {
                let [a, b] = expect_args::<2>(name, args)?;
                match (self.evaluate(a, ctx)?, self.evaluate(b, ctx)?) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            "lt" | "lte" | "gt" | "gte" => {
                let [a, b] = expect_args::<2>(name, args)?;
                let (Some(a), Some(b)) = (self.evaluate(a, ctx)?, self.evaluate(b, ctx)?) else {
                    return Ok(Some(false.into()));
                };
                let Some(ordering) = compare(&a, &b) else {
                    return Err(ExpressionEvaluationError::TypeMismatch {
                        function: name.to_string(),
                        expected: "two numbers, strings or dates",
                        actual: format!("{:?} and {:?}", a.expression_type(), b.expression_type()),
                    });
                };
                match name {
                    "lt" => ordering == Ordering::Less,
                    "lte" => ordering != Ordering::Greater,
                    "gt" => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
            "hasResponse" => {
                let [arg] = expect_args::<1>(name, args)?;
                let key = self.eval_string(name, arg, ctx)?;
                if !ctx.responses.contains(&key) {
                    return Err(ExpressionEvaluationError::InvalidReference(key));
                }
                ctx.responses
                    .get(&key)
                    .is_some_and(|response| response.has_response())
            }
            "responseHasKeysAny" | "responseHasKeysAll" => {
                let Some((selection, keys)) = args.split_first() else {
                    return Err(ExpressionEvaluationError::ArgumentCount {
                        function: name.to_string(),
                        expected: "at least 2",
                        actual: 0,
                    });
                };
                if keys.is_empty() {
                    return Err(ExpressionEvaluationError::ArgumentCount {
                        function: name.to_string(),
                        expected: "at least 2",
                        actual: args.len(),
                    });
                }
                let selected = match self.evaluate(selection, ctx)? {
                    None => Vec::new(),
                    Some(ExpressionValue::String(s)) => vec![s],
                    Some(ExpressionValue::StringArray(v)) => v,
                    Some(other) => {
                        return Err(ExpressionEvaluationError::TypeMismatch {
                            function: name.to_string(),
                            expected: "string or string array",
                            actual: format!("{:?}", other.expression_type()),
                        });
                    }
                };
                let wanted = keys
                    .iter()
                    .map(|k| self.eval_string(name, k, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                if name == "responseHasKeysAny" {
                    wanted.iter().any(|k| selected.contains(k))
                } else {
                    wanted.iter().all(|k| selected.contains(k))
                }
            }
            "dateFromTimestamp" => {
                let [arg] = expect_args::<1>(name, args)?;
                return match self.evaluate(arg, ctx)? {
                    None => Ok(None),
                    Some(ExpressionValue::Number(secs)) => {
                        Ok(date_from_timestamp(secs).map(ExpressionValue::Date))
                    }
                    Some(other) => Err(ExpressionEvaluationError::TypeMismatch {
                        function: name.to_string(),
                        expected: "number",
                        actual: format!("{:?}", other.expression_type()),
                    }),
                };
            }
            other => return Err(ExpressionEvaluationError::UnknownFunction(other.to_string())),
        };
        Ok(Some(ExpressionValue::Boolean(result)))
    }

    /// Evaluate a boolean operand; undefined counts as `false`.
    fn eval_flag(
        &self,
        function: &str,
        arg: &Expression,
        ctx: &EvalContext<'_>,
    ) -> Result<bool, ExpressionEvaluationError> {
        match self.evaluate(arg, ctx)? {
            None => Ok(false),
            Some(ExpressionValue::Boolean(b)) => Ok(b),
            Some(other) => Err(ExpressionEvaluationError::TypeMismatch {
                function: function.to_string(),
                expected: "boolean",
                actual: format!("{:?}", other.expression_type()),
            }),
        }
    }

    fn eval_string(
        &self,
        function: &str,
        arg: &Expression,
        ctx: &EvalContext<'_>,
    ) -> Result<String, ExpressionEvaluationError> {
        match self.evaluate(arg, ctx)? {
            Some(ExpressionValue::String(s)) => Ok(s),
            other => Err(ExpressionEvaluationError::TypeMismatch {
                function: function.to_string(),
                expected: "string",
                actual: match other {
                    Some(v) => format!("{:?}", v.expression_type()),
                    None => "undefined".to_string(),
                },
            }),
        }
    }
}

fn expect_args<'e, const N: usize>(
    function: &str,
    args: &'e [Expression],
) -> Result<&'e [Expression; N], ExpressionEvaluationError> {
    args.try_into()
        .map_err(|_| ExpressionEvaluationError::ArgumentCount {
            function: function.to_string(),
            expected: match N {
                1 => "1",
                2 => "2",
                _ => "more",
            },
            actual: args.len(),
        })
}

fn compare(a: &ExpressionValue, b: &ExpressionValue) -> Option<Ordering> {
    match (a, b) {
        (ExpressionValue::Number(a), ExpressionValue::Number(b)) => a.partial_cmp(b),
        (ExpressionValue::String(a), ExpressionValue::String(b)) => Some(a.cmp(b)),
        (ExpressionValue::Date(a), ExpressionValue::Date(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn resolve_context_variable(
    context_type: ContextVariableType,
    key: Option<&str>,
    ctx: &EvalContext<'_>,
) -> Result<Option<ExpressionValue>, ExpressionEvaluationError> {
    match context_type {
        ContextVariableType::Locale => Ok(ctx.context.locale.clone().map(ExpressionValue::String)),
        ContextVariableType::ParticipantFlag => {
            let key = key.ok_or_else(|| {
                ExpressionEvaluationError::InvalidReference("participant flag without key".into())
            })?;
            Ok(ctx
                .context
                .participant_flags
                .get(key)
                .cloned()
                .map(ExpressionValue::String))
        }
        ContextVariableType::CustomValue => {
            let key = key.ok_or_else(|| {
                ExpressionEvaluationError::InvalidReference("custom value without key".into())
            })?;
            Ok(ctx.context.custom_values.get(key).cloned())
        }
    }
}
