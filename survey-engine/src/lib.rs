//! # survey-engine
//!
//! Render and evaluate hierarchical surveys.
//!
//! A [`Survey`] is a flat map of items keyed by dotted full keys, where groups
//! list the keys of their children. A [`SurveyEngineCore`] runs one session
//! against a survey: it builds a render tree that honors each group's shuffle
//! setting, keeps the participant's responses and their timestamps, evaluates
//! display, disabled, validation and template expressions on demand, and
//! splits the rendered items into pages.
//!
//! ## Usage
//!
//! ```rust
//! use survey_engine::{DeviceClass, ResponseItem, Survey, SurveyEngineCore};
//!
//! let json = r#"{
//!     "$schema": "urn:survey-engine:schema:survey:v1",
//!     "maxItemsPerPage": { "large": 10, "small": 1 },
//!     "surveyItems": {
//!         "intro": { "itemType": "group", "items": ["intro.q1", "intro.q2"] },
//!         "intro.q1": { "itemType": "singleChoiceQuestion" },
//!         "intro.q2": { "itemType": "singleChoiceQuestion" }
//!     }
//! }"#;
//!
//! let survey = Survey::from_json_str(json).unwrap();
//! let mut engine = SurveyEngineCore::builder(survey).seed(42).build().unwrap();
//!
//! engine.set_response("intro.q1", ResponseItem::with_value("yes")).unwrap();
//! assert!(engine.get_response_item("intro.q1").is_some());
//! assert_eq!(engine.get_survey_pages(Some(DeviceClass::Small)).len(), 2);
//! ```
//!
//! ## Expressions
//!
//! The engine never interprets expressions itself. It hands them to an
//! [`ExpressionEvaluator`], by default the [`BasicEvaluator`]. Evaluation
//! errors are logged with `tracing` and fall back to `false` for conditions
//! and to no value for templates.

// Re-export all types from survey-engine-types
pub use survey_engine_types::*;

mod cache;
mod clock;
mod context;
mod date_format;
mod engine;
mod evaluator;
mod pagination;
mod render_tree;
mod response_store;

pub use cache::{CacheKey, CachedValue, ConditionalCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::SurveyContext;
pub use date_format::format_date;
pub use engine::{EngineError, SurveyEngineBuilder, SurveyEngineCore};
pub use evaluator::{BasicEvaluator, EvalContext, ExpressionEvaluationError, ExpressionEvaluator};
pub use pagination::{DeviceClass, paginate};
pub use render_tree::{RenderedItem, RenderedSurveyTree};
pub use response_store::ResponseStore;
