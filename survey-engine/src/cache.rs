//! Lazily computed conditional values.
//!
//! Display conditions, disabled conditions, validations and template values
//! are evaluated on first lookup and kept until the next response mutation.
//! Evaluation failures never reach the caller: boolean slots fall back to
//! `Some(false)` and template slots to `None`.

use std::collections::{BTreeMap, HashMap};

use survey_engine_types::{
    ContentItem, DEFAULT_DATE_FORMAT, Expression, ExpressionType, ExpressionValue, Survey,
    SurveyItem, TemplateMode, TemplateValueDefinition, TypedValue,
};
use tracing::{trace, warn};

use crate::{EvalContext, ExpressionEvaluator, ResponseStore, SurveyContext, format_date};

/// Which value of an item a cache slot holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    DisplayRoot,
    DisplayComponent(String),
    DisabledComponent(String),
    Validations,
    Template(String),
}

/// A computed cache slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Flag(Option<bool>),
    Validations(Option<BTreeMap<String, bool>>),
    Template(Option<TypedValue>),
}

impl CachedValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(flag) => *flag,
            _ => None,
        }
    }

    pub fn as_validations(&self) -> Option<&BTreeMap<String, bool>> {
        match self {
            Self::Validations(values) => values.as_ref(),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&TypedValue> {
        match self {
            Self::Template(value) => value.as_ref(),
            _ => None,
        }
    }
}

/// Computed values keyed by `(item full key, slot)`.
#[derive(Debug, Clone, Default)]
pub struct ConditionalCache {
    entries: HashMap<(String, CacheKey), CachedValue>,
}

impl ConditionalCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a slot without computing it.
    pub fn get(&self, item_key: &str, key: &CacheKey) -> Option<&CachedValue> {
        self.entries.get(&(item_key.to_string(), key.clone()))
    }

    /// Return the cached value, computing and storing it on a miss.
    pub fn get_or_insert_with(
        &mut self,
        item_key: &str,
        key: CacheKey,
        compute: impl FnOnce() -> CachedValue,
    ) -> &CachedValue {
        self.entries
            .entry((item_key.to_string(), key))
            .or_insert_with(compute)
    }

    /// Check if a slot has been computed.
    pub fn contains(&self, item_key: &str, key: &CacheKey) -> bool {
        self.get(item_key, key).is_some()
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            trace!(entries = self.entries.len(), "Invalidating conditional cache");
        }
        self.entries.clear();
    }

    /// Get the number of computed slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes cache slots from the current state of one engine.
pub(crate) struct Resolver<'a> {
    pub survey: &'a Survey,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub responses: &'a ResponseStore,
    pub context: &'a SurveyContext,
}

impl Resolver<'_> {
    pub fn resolve(&self, item_key: &str, key: &CacheKey) -> CachedValue {
        let item = self.survey.item(item_key);
        let content = item.and_then(SurveyItem::content_item);
        match key {
            CacheKey::DisplayRoot => CachedValue::Flag(item.and_then(|item| {
                let expr = content?.root_display_condition()?;
                Some(self.flag(item, None, expr))
            })),
            CacheKey::DisplayComponent(component) => CachedValue::Flag(item.and_then(|item| {
                let expr = content?.component_display_condition(component)?;
                Some(self.flag(item, Some(component), expr))
            })),
            CacheKey::DisabledComponent(component) => CachedValue::Flag(item.and_then(|item| {
                let expr = content?.component_disabled_condition(component)?;
                Some(self.flag(item, Some(component), expr))
            })),
            CacheKey::Validations => CachedValue::Validations(
                item.zip(content)
                    .and_then(|(item, content)| self.validations(item, content)),
            ),
            CacheKey::Template(template_key) => CachedValue::Template(item.and_then(|item| {
                let definition = content?.template_value(template_key)?;
                self.template(item, template_key, definition)
            })),
        }
    }

    fn evaluate(
        &self,
        item: &SurveyItem,
        component: Option<&str>,
        expression: &Expression,
    ) -> Option<Option<ExpressionValue>> {
        let ctx = EvalContext {
            responses: self.responses,
            item_key: item.key(),
            component_key: component,
            context: self.context,
        };
        match self.evaluator.evaluate(expression, &ctx) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    item = %item.key(),
                    component = component.unwrap_or_default(),
                    error = %err,
                    "Expression evaluation failed"
                );
                None
            }
        }
    }

    /// Evaluate a boolean condition. Errors and undefined results are `false`.
    fn flag(&self, item: &SurveyItem, component: Option<&str>, expression: &Expression) -> bool {
        match self.evaluate(item, component, expression) {
            Some(Some(value)) => match value.cast(ExpressionType::Boolean) {
                Some(ExpressionValue::Boolean(b)) => b,
                _ => {
                    warn!(
                        item = %item.key(),
                        found = ?value.expression_type(),
                        "Condition did not evaluate to a boolean"
                    );
                    false
                }
            },
            Some(None) | None => false,
        }
    }

    fn validations(
        &self,
        item: &SurveyItem,
        content: &ContentItem,
    ) -> Option<BTreeMap<String, bool>> {
        let declared = content.declared_validations()?;
        Some(
            declared
                .iter()
                .map(|(key, expr)| (key.clone(), self.flag(item, None, expr)))
                .collect(),
        )
    }

    fn template(
        &self,
        item: &SurveyItem,
        template_key: &str,
        definition: &TemplateValueDefinition,
    ) -> Option<TypedValue> {
        let value = self.evaluate(item, None, definition.expression.as_ref()?)??;
        let resolved = match definition.mode {
            TemplateMode::Default => value.cast(definition.return_type),
            TemplateMode::Date2String => {
                let date = value.cast(ExpressionType::Date);
                date.as_ref().and_then(ExpressionValue::as_date).map(|date| {
                    let pattern = definition
                        .date_format
                        .as_deref()
                        .unwrap_or(DEFAULT_DATE_FORMAT);
                    ExpressionValue::String(format_date(&date, pattern))
                })
            }
        };
        if resolved.is_none() {
            warn!(
                item = %item.key(),
                template = template_key,
                found = ?value.expression_type(),
                mode = ?definition.mode,
                "Template value has an unusable type"
            );
        }
        resolved.map(TypedValue::new)
    }
}
