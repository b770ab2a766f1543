use serde_json::json;
use survey_engine::{SURVEY_SCHEMA_URI, Survey, SurveyError};

/// A survey with two end markers.
///
/// The first one in structural order, `survey.block.done`, sits inside a
/// subgroup and comes before the top-level `survey.end`.
pub fn nested_survey_ends() -> Result<Survey, SurveyError> {
    let doc = json!({
        "$schema": SURVEY_SCHEMA_URI,
        "surveyItems": {
            "survey": {
                "itemType": "group",
                "items": ["survey.intro", "survey.block", "survey.end"]
            },
            "survey.intro": { "itemType": "display" },
            "survey.block": {
                "itemType": "group",
                "shuffleItems": true,
                "items": ["survey.block.q1", "survey.block.done"]
            },
            "survey.block.q1": { "itemType": "singleChoiceQuestion" },
            "survey.block.done": { "itemType": "surveyEnd" },
            "survey.end": { "itemType": "surveyEnd" }
        }
    });
    Survey::from_json(&serde_json::from_value(doc)?)
}

/// A survey without any end marker.
pub fn without_survey_end() -> Result<Survey, SurveyError> {
    let doc = json!({
        "$schema": SURVEY_SCHEMA_URI,
        "surveyItems": {
            "survey": { "itemType": "group", "items": ["survey.q1", "survey.pb"] },
            "survey.q1": { "itemType": "singleChoiceQuestion" },
            "survey.pb": { "itemType": "pageBreak" }
        }
    });
    Survey::from_json(&serde_json::from_value(doc)?)
}
