use survey_engine::{Survey, SurveyError};

/// A short questionnaire exercising conditions, validations and templates.
///
/// - `health.cigarettes` is shown only if `health.smoker` selected `yes`, and
///   carries validations plus three templates reading its own slots.
/// - `health.empty` declares every conditional object, all of them empty.
/// - `health.broken` calls a function no evaluator knows.
/// - `health.greeting` reads the locale from the context and formats a date
///   given as an RFC 3339 string.
pub const HEALTH_CHECK_JSON: &str = r#"{
  "$schema": "urn:survey-engine:schema:survey:v1",
  "maxItemsPerPage": { "large": 3, "small": 1 },
  "surveyItems": {
    "health": {
      "itemType": "group",
      "items": [
        "health.smoker",
        "health.cigarettes",
        "health.pb",
        "health.empty",
        "health.plain",
        "health.broken",
        "health.greeting",
        "health.end"
      ]
    },
    "health.smoker": {
      "itemType": "singleChoiceQuestion",
      "components": [
        {
          "key": "rg",
          "componentType": "singleChoice",
          "items": [
            { "key": "yes", "componentType": "scgMcgOption", "props": { "label": "Yes" } },
            { "key": "no", "componentType": "scgMcgOption", "props": { "label": "No" } }
          ]
        }
      ]
    },
    "health.cigarettes": {
      "itemType": "singleChoiceQuestion",
      "components": [
        {
          "key": "rg",
          "componentType": "singleChoice",
          "items": [
            { "key": "light", "componentType": "scgMcgOption" },
            { "key": "heavy", "componentType": "scgMcgOption" }
          ]
        }
      ],
      "displayConditions": {
        "root": {
          "type": "function",
          "functionName": "responseHasKeysAny",
          "arguments": [
            { "type": "responseVariable", "variableRef": "health.smoker" },
            { "type": "const", "value": { "type": "string", "value": "yes" } }
          ]
        },
        "components": {
          "rg.heavy": {
            "type": "function",
            "functionName": "gte",
            "arguments": [
              { "type": "responseVariable", "variableRef": "health.cigarettes...count" },
              { "type": "const", "value": { "type": "number", "value": 20 } }
            ]
          }
        }
      },
      "disabledConditions": {
        "components": {
          "rg.heavy": {
            "type": "function",
            "functionName": "not",
            "arguments": [
              {
                "type": "function",
                "functionName": "hasResponse",
                "arguments": [
                  { "type": "const", "value": { "type": "string", "value": "health.smoker" } }
                ]
              }
            ]
          }
        }
      },
      "validations": {
        "answered": {
          "type": "function",
          "functionName": "hasResponse",
          "arguments": [
            { "type": "const", "value": { "type": "string", "value": "health.cigarettes" } }
          ]
        },
        "plausible": {
          "type": "function",
          "functionName": "lte",
          "arguments": [
            { "type": "responseVariable", "variableRef": "health.cigarettes...count" },
            { "type": "const", "value": { "type": "number", "value": 100 } }
          ]
        }
      },
      "templateValues": {
        "since": {
          "type": "date2String",
          "returnType": "string",
          "dateFormat": "dd/MM/yyyy",
          "expression": { "type": "responseVariable", "variableRef": "health.cigarettes...since" }
        },
        "sinceDefault": {
          "type": "date2String",
          "returnType": "string",
          "expression": {
            "type": "function",
            "functionName": "dateFromTimestamp",
            "arguments": [
              { "type": "responseVariable", "variableRef": "health.cigarettes...since" }
            ]
          }
        },
        "count": {
          "type": "default",
          "returnType": "string",
          "expression": { "type": "responseVariable", "variableRef": "health.cigarettes...count" }
        }
      }
    },
    "health.pb": { "itemType": "pageBreak" },
    "health.empty": {
      "itemType": "display",
      "displayConditions": {},
      "disabledConditions": {},
      "validations": {},
      "templateValues": {}
    },
    "health.plain": {
      "itemType": "display",
      "components": [
        { "key": "text", "componentType": "markdown", "props": { "content": "Thanks!" } }
      ]
    },
    "health.broken": {
      "itemType": "display",
      "displayConditions": {
        "root": { "type": "function", "functionName": "frobnicate", "arguments": [] }
      },
      "templateValues": {
        "bad": {
          "type": "default",
          "returnType": "number",
          "expression": { "type": "function", "functionName": "frobnicate" }
        }
      }
    },
    "health.greeting": {
      "itemType": "display",
      "templateValues": {
        "locale": {
          "returnType": "string",
          "expression": { "type": "contextVariable", "contextType": "locale" }
        },
        "launch": {
          "type": "date2String",
          "returnType": "string",
          "dateFormat": "yyyy-MM-dd",
          "expression": { "type": "const", "value": { "type": "string", "value": "2024-05-01T12:00:00Z" } }
        }
      }
    },
    "health.end": { "itemType": "surveyEnd" }
  }
}"#;

/// Parse [`HEALTH_CHECK_JSON`].
pub fn health_check() -> Result<Survey, SurveyError> {
    Survey::from_json_str(HEALTH_CHECK_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses() {
        let survey = health_check().unwrap();
        assert_eq!(survey.len(), 9);
        assert_eq!(survey.leaf_items().len(), 8);
    }
}
