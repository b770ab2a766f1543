use std::collections::HashMap;

use survey_engine_types::{
    DEFAULT_MAX_TIMESTAMPS, JsonSurveyItemResponse, ResponseItem, ResponseMeta, StructuralError,
    Survey, SurveyItemResponse, TimestampKind,
};
use tracing::debug;

/// Response state for one session: one entry per leaf item of the survey.
///
/// Entries keep the structural pre-order of the survey regardless of how the
/// render tree was shuffled.
#[derive(Debug, Clone)]
pub struct ResponseStore {
    responses: Vec<SurveyItemResponse>,
    index: HashMap<String, usize>,
    positions: HashMap<String, i32>,
    locale_code: Option<String>,
    max_timestamps: usize,
}

impl ResponseStore {
    /// Create an empty response for every leaf item of `survey`.
    pub fn from_survey(survey: &Survey) -> Self {
        let responses: Vec<SurveyItemResponse> = survey
            .leaf_items()
            .into_iter()
            .map(|item| SurveyItemResponse::new(item.key().clone(), item.item_type()))
            .collect();
        let index = responses
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key.full_key().to_string(), i))
            .collect();
        Self {
            responses,
            index,
            positions: HashMap::new(),
            locale_code: None,
            max_timestamps: DEFAULT_MAX_TIMESTAMPS,
        }
    }

    /// Set the locale written into newly created metadata.
    pub fn with_locale(mut self, locale_code: Option<String>) -> Self {
        self.locale_code = locale_code;
        self
    }

    /// Set the cap on each timestamp list.
    pub fn with_max_timestamps(mut self, max_timestamps: usize) -> Self {
        self.max_timestamps = max_timestamps;
        self
    }

    /// Record the render position of each item, in the order given.
    ///
    /// Positions are used when metadata is first created for an item. Items
    /// not in `keys` get position `-1`.
    pub fn set_positions<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        self.positions = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| (key.to_string(), i as i32))
            .collect();
    }

    /// Apply prefilled responses, returning how many were applied.
    ///
    /// A prefill is applied only when its item exists and its declared item
    /// type matches the item's actual type. Everything else is skipped.
    pub fn apply_prefills(&mut self, prefills: &[JsonSurveyItemResponse]) -> usize {
        let mut applied = 0;
        for prefill in prefills {
            let Some(&i) = self.index.get(&prefill.key) else {
                debug!(key = %prefill.key, "Skipping prefill for unknown item");
                continue;
            };
            let entry = &mut self.responses[i];
            if entry.item_type != prefill.item_type {
                debug!(
                    key = %prefill.key,
                    expected = ?entry.item_type,
                    found = ?prefill.item_type,
                    "Skipping prefill with mismatched item type"
                );
                continue;
            }
            entry.response = prefill.response.clone();
            applied += 1;
        }
        applied
    }

    /// All responses, in structural pre-order.
    pub fn responses(&self) -> &[SurveyItemResponse] {
        &self.responses
    }

    /// Check if `full_key` names a leaf item of the survey.
    pub fn contains(&self, full_key: &str) -> bool {
        self.index.contains_key(full_key)
    }

    pub fn get(&self, full_key: &str) -> Option<&SurveyItemResponse> {
        self.index.get(full_key).map(|&i| &self.responses[i])
    }

    /// The stored answer for an item, if any.
    pub fn response_item(&self, full_key: &str) -> Option<&ResponseItem> {
        self.get(full_key).and_then(|r| r.response.as_ref())
    }

    /// Replace the response of an item and record a `responded` timestamp.
    pub fn set_response(
        &mut self,
        full_key: &str,
        response: ResponseItem,
        timestamp: i64,
    ) -> Result<(), StructuralError> {
        let entry = self.entry_mut(full_key)?;
        entry.response = Some(response);
        self.record(full_key, TimestampKind::Responded, timestamp)
    }

    /// Append a timestamp to an item's metadata, creating the metadata if absent.
    pub fn record(
        &mut self,
        full_key: &str,
        kind: TimestampKind,
        timestamp: i64,
    ) -> Result<(), StructuralError> {
        let position = self.positions.get(full_key).copied().unwrap_or(-1);
        let locale_code = self.locale_code.clone();
        let max_timestamps = self.max_timestamps;
        let entry = self.entry_mut(full_key)?;
        entry
            .meta
            .get_or_insert_with(|| ResponseMeta::new(position, locale_code))
            .record(kind, timestamp, max_timestamps);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    fn entry_mut(&mut self, full_key: &str) -> Result<&mut SurveyItemResponse, StructuralError> {
        let i = *self
            .index
            .get(full_key)
            .ok_or_else(|| StructuralError::UnknownItem(full_key.to_string()))?;
        Ok(&mut self.responses[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_engine_types::{SurveyItem, SurveyItemKey, SurveyItemType};

    fn survey() -> Survey {
        let mut survey = Survey::new("s").unwrap();
        let group = SurveyItemKey::new("g", Some("s")).unwrap();
        survey.add_item(SurveyItem::group(group.clone(), None)).unwrap();
        for (parent, leaf) in [(&group, "q1"), (&group, "q2")] {
            let key = parent.child(leaf).unwrap();
            survey
                .add_item(SurveyItem::content(key, SurveyItemType::SingleChoiceQuestion).unwrap())
                .unwrap();
        }
        let key = SurveyItemKey::new("end", Some("s")).unwrap();
        survey.add_item(SurveyItem::survey_end(key)).unwrap();
        survey
    }

    #[test]
    fn one_entry_per_leaf_in_structural_order() {
        let store = ResponseStore::from_survey(&survey());
        let keys: Vec<&str> = store.responses().iter().map(|r| r.key.full_key()).collect();
        assert_eq!(keys, ["s.g.q1", "s.g.q2", "s.end"]);
        assert!(store.responses().iter().all(|r| r.response.is_none()));
        assert!(!store.contains("s.g"));
    }

    #[test]
    fn set_response_records_timestamp() {
        let mut store = ResponseStore::from_survey(&survey());
        store
            .set_response("s.g.q1", ResponseItem::with_value("a"), 10)
            .unwrap();
        let entry = store.get("s.g.q1").unwrap();
        assert!(entry.has_response());
        assert_eq!(entry.meta.as_ref().unwrap().responded, [10]);
    }

    #[test]
    fn set_response_unknown_item() {
        let mut store = ResponseStore::from_survey(&survey());
        let err = store
            .set_response("s.nope", ResponseItem::with_value("a"), 10)
            .unwrap_err();
        assert_eq!(err, StructuralError::UnknownItem("s.nope".into()));
    }

    #[test]
    fn prefills_require_matching_type() {
        let mut store = ResponseStore::from_survey(&survey());
        let applied = store.apply_prefills(&[
            JsonSurveyItemResponse::new(
                "s.g.q1",
                SurveyItemType::SingleChoiceQuestion,
                ResponseItem::with_value("a"),
            ),
            JsonSurveyItemResponse::new(
                "s.g.q2",
                SurveyItemType::MultipleChoiceQuestion,
                ResponseItem::with_value(vec!["b"]),
            ),
            JsonSurveyItemResponse::new(
                "s.missing",
                SurveyItemType::SingleChoiceQuestion,
                ResponseItem::with_value("c"),
            ),
        ]);
        assert_eq!(applied, 1);
        assert!(store.get("s.g.q1").unwrap().has_response());
        assert!(!store.get("s.g.q2").unwrap().has_response());
    }

    #[test]
    fn metadata_uses_position_and_locale() {
        let mut store = ResponseStore::from_survey(&survey())
            .with_locale(Some("fr".into()))
            .with_max_timestamps(2);
        store.set_positions(["s.g.q2", "s.g.q1"]);
        for ts in [1, 2, 3] {
            store.record("s.g.q1", TimestampKind::Displayed, ts).unwrap();
        }
        let meta = store.get("s.g.q1").unwrap().meta.clone().unwrap();
        assert_eq!(meta.position, 1);
        assert_eq!(meta.locale_code.as_deref(), Some("fr"));
        assert_eq!(meta.displayed, [2, 3]);
        assert!(meta.rendered.is_empty());
    }
}
