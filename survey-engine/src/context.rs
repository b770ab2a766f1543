use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use survey_engine_types::ExpressionValue;

/// Engine-level values that expressions may read, independent of responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SurveyContext {
    /// Locale of the session, e.g. `"en"`. Also stored in response metadata.
    pub locale: Option<String>,

    /// Flags attached to the participant.
    pub participant_flags: BTreeMap<String, String>,

    /// Arbitrary values supplied by the embedding application.
    pub custom_values: BTreeMap<String, ExpressionValue>,
}

impl SurveyContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Set a participant flag.
    pub fn with_participant_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.participant_flags.insert(key.into(), value.into());
        self
    }

    /// Set a custom value.
    pub fn with_custom_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<ExpressionValue>,
    ) -> Self {
        self.custom_values.insert(key.into(), value.into());
        self
    }
}
