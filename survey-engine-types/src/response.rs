use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{ResponseValue, SurveyItemKey, SurveyItemType};

/// Default cap on each metadata timestamp list.
pub const DEFAULT_MAX_TIMESTAMPS: usize = 100;

/// The answer given to one item: a main value and any number of named slots.
///
/// Slots hold secondary inputs such as the free text of an "other" option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ResponseValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, ResponseValue>,
}

impl ResponseItem {
    /// Create an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a response holding a main value.
    pub fn with_value(value: impl Into<ResponseValue>) -> Self {
        Self {
            value: Some(value.into()),
            slots: BTreeMap::new(),
        }
    }

    /// Set a slot value, returning the updated response.
    pub fn with_slot(mut self, slot: impl Into<String>, value: impl Into<ResponseValue>) -> Self {
        self.slots.insert(slot.into(), value.into());
        self
    }

    /// Get a slot value.
    pub fn slot(&self, slot: &str) -> Option<&ResponseValue> {
        self.slots.get(slot)
    }

    /// Check if the response holds neither a value nor any slot.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.slots.is_empty()
    }
}

/// Which metadata timestamp list an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    Rendered,
    Displayed,
    Responded,
}

/// Bookkeeping recorded alongside a response.
///
/// Timestamps are unix seconds. Each list keeps at most a fixed number of
/// entries, dropping the oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseMeta {
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale_code: Option<String>,
    pub rendered: VecDeque<i64>,
    pub displayed: VecDeque<i64>,
    pub responded: VecDeque<i64>,
}

impl ResponseMeta {
    /// Create metadata for an item at the given render position.
    pub fn new(position: i32, locale_code: Option<String>) -> Self {
        Self {
            position,
            locale_code,
            ..Self::default()
        }
    }

    /// Append a timestamp, evicting the oldest entries beyond `max_len`.
    pub fn record(&mut self, kind: TimestampKind, timestamp: i64, max_len: usize) {
        let list = match kind {
            TimestampKind::Rendered => &mut self.rendered,
            TimestampKind::Displayed => &mut self.displayed,
            TimestampKind::Responded => &mut self.responded,
        };
        list.push_back(timestamp);
        while list.len() > max_len {
            list.pop_front();
        }
    }
}

/// The response state of one survey item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyItemResponse {
    pub key: SurveyItemKey,
    pub item_type: SurveyItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

impl SurveyItemResponse {
    /// Create an empty response for an item.
    pub fn new(key: SurveyItemKey, item_type: SurveyItemType) -> Self {
        Self {
            key,
            item_type,
            response: None,
            meta: None,
        }
    }

    /// Check if this item has been answered.
    pub fn has_response(&self) -> bool {
        self.response.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// An externally supplied response, as used for prefills.
///
/// The key is kept as a plain string so that prefills for unknown or
/// malformed keys can be skipped rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSurveyItemResponse {
    pub key: String,
    pub item_type: SurveyItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseItem>,
}

impl JsonSurveyItemResponse {
    pub fn new(key: impl Into<String>, item_type: SurveyItemType, response: ResponseItem) -> Self {
        Self {
            key: key.into(),
            item_type,
            response: Some(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps_evict_oldest() {
        let mut meta = ResponseMeta::new(0, None);
        for ts in 1..=5 {
            meta.record(TimestampKind::Displayed, ts, 3);
        }
        assert_eq!(meta.displayed, VecDeque::from(vec![3, 4, 5]));
        assert!(meta.responded.is_empty());
    }

    #[test]
    fn response_item_json() {
        let item = ResponseItem::with_value(vec!["a", "b"]).with_slot("other", "text");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({ "value": ["a", "b"], "slots": { "other": "text" } }));
        let back: ResponseItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn untagged_values_keep_their_kind() {
        let values: Vec<ResponseValue> =
            serde_json::from_value(json!([true, 2.5, "x", ["y"]])).unwrap();
        assert_eq!(
            values,
            vec![
                ResponseValue::Bool(true),
                ResponseValue::Number(2.5),
                ResponseValue::String("x".into()),
                ResponseValue::Keys(vec!["y".into()]),
            ]
        );
    }

    #[test]
    fn has_response_ignores_empty_items() {
        let key = SurveyItemKey::parse("survey.q1").unwrap();
        let mut response = SurveyItemResponse::new(key, SurveyItemType::SingleChoiceQuestion);
        assert!(!response.has_response());
        response.response = Some(ResponseItem::new());
        assert!(!response.has_response());
        response.response = Some(ResponseItem::with_value("yes"));
        assert!(response.has_response());
    }

    #[test]
    fn prefill_json() {
        let prefill: JsonSurveyItemResponse = serde_json::from_value(json!({
            "key": "survey.q1",
            "itemType": "singleChoiceQuestion",
            "response": { "value": "yes" }
        }))
        .unwrap();
        assert_eq!(prefill.item_type, SurveyItemType::SingleChoiceQuestion);
        assert_eq!(
            prefill.response.unwrap().value,
            Some(ResponseValue::String("yes".into()))
        );
    }
}
