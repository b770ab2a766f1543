//! Core types for the survey-engine crate.
//!
//! This crate provides the foundational types for defining surveys:
//! - `SurveyItemKey` and `ItemComponentKey` - Dotted hierarchical keys
//! - `Survey` and `SurveyItem` - The survey tree and its JSON form
//! - `Expression` and `ExpressionValue` - Conditional logic attached to items
//! - `SurveyItemResponse` and `ResponseItem` - Response state and metadata

mod key;
pub use key::{ItemComponentKey, SurveyItemKey};

mod expression;
pub use expression::{
    ContextVariableType, Expression, ExpressionType, ExpressionValue, SLOT_SEPARATOR, TypedValue,
    VariableRef, date_from_timestamp,
};

mod item;
pub use item::{
    ContentItem, DEFAULT_DATE_FORMAT, DisabledConditions, DisplayConditions, GroupItem,
    ItemComponent, ItemComponentType, JsonItemComponent, JsonSurveyItem, SurveyItem,
    SurveyItemKind, SurveyItemType, TemplateMode, TemplateValueDefinition,
};

mod response_value;
pub use response_value::ResponseValue;

mod response;
pub use response::{
    DEFAULT_MAX_TIMESTAMPS, JsonSurveyItemResponse, ResponseItem, ResponseMeta,
    SurveyItemResponse, TimestampKind,
};

mod survey;
pub use survey::{JsonSurvey, MaxItemsPerPage, SURVEY_SCHEMA_URI, Survey, SurveyItemEntries};

mod error;
pub use error::{KeyError, SchemaError, StructuralError, SurveyError};
