use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    Expression, JsonSurveyItem, SchemaError, StructuralError, SurveyError, SurveyItem,
    SurveyItemKey, SurveyItemType,
};

/// The only `$schema` value accepted by [`Survey::from_json`].
pub const SURVEY_SCHEMA_URI: &str = "urn:survey-engine:schema:survey:v1";

/// Page size limits per device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxItemsPerPage {
    pub large: usize,
    pub small: usize,
}

/// A survey definition: every item, indexed by full key.
///
/// The tree is stored as an adjacency list. Groups list the full keys of their
/// children, and the items themselves live flat in one map. A survey has
/// exactly one root item, which is a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
    survey_items: BTreeMap<String, SurveyItem>,
    pub max_items_per_page: Option<MaxItemsPerPage>,
    pub translations: Option<serde_json::Value>,
    pub prefill_rules: Vec<Expression>,
    pub metadata: BTreeMap<String, String>,
}

impl Survey {
    /// Create a survey holding only an empty root group.
    pub fn new(root_key: &str) -> Result<Self, SurveyError> {
        let root = SurveyItem::group(SurveyItemKey::root(root_key)?, None);
        let mut survey_items = BTreeMap::new();
        survey_items.insert(root.key().full_key().to_string(), root);
        Ok(Self {
            survey_items,
            max_items_per_page: None,
            translations: None,
            prefill_rules: Vec::new(),
            metadata: BTreeMap::new(),
        })
    }

    /// Set the page size limits.
    pub fn with_max_items_per_page(mut self, large: usize, small: usize) -> Self {
        self.max_items_per_page = Some(MaxItemsPerPage { large, small });
        self
    }

    /// Add an item below its parent group, appending it to the group's children.
    pub fn add_item(&mut self, item: SurveyItem) -> Result<(), StructuralError> {
        let full_key = item.key().full_key().to_string();
        if self.survey_items.contains_key(&full_key) {
            return Err(StructuralError::DuplicateKey(full_key));
        }
        let Some(parent_key) = item.key().parent_full_key().filter(|p| !p.is_empty()) else {
            return Err(StructuralError::MultipleRoots(vec![
                self.root_item()?.key().full_key().to_string(),
                full_key,
            ]));
        };
        let parent = self
            .survey_items
            .get_mut(parent_key)
            .ok_or_else(|| StructuralError::MissingParent {
                key: full_key.clone(),
                parent: parent_key.to_string(),
            })?;
        let group = parent
            .as_group_mut()
            .ok_or_else(|| StructuralError::NotAGroup(parent_key.to_string()))?;
        group.items.push(full_key.clone());
        self.survey_items.insert(full_key, item);
        Ok(())
    }

    /// Build a survey from its JSON document.
    ///
    /// Rejects unknown schemas, empty item maps, duplicate keys, malformed
    /// keys and inconsistent trees.
    pub fn from_json(json: &JsonSurvey) -> Result<Self, SurveyError> {
        if json.schema != SURVEY_SCHEMA_URI {
            return Err(SchemaError::UnsupportedSchema {
                expected: SURVEY_SCHEMA_URI,
                found: json.schema.clone(),
            }
            .into());
        }
        if json.survey_items.is_empty() {
            return Err(SchemaError::MissingSurveyItems.into());
        }

        let mut survey_items = BTreeMap::new();
        for (full_key, item_json) in json.survey_items.iter() {
            let item = SurveyItem::from_json(full_key, item_json)?;
            if survey_items.insert(full_key.clone(), item).is_some() {
                return Err(StructuralError::DuplicateKey(full_key.clone()).into());
            }
        }

        let survey = Self {
            survey_items,
            max_items_per_page: json.max_items_per_page,
            translations: json.translations.clone(),
            prefill_rules: json.prefill_rules.clone().unwrap_or_default(),
            metadata: json.metadata.clone().unwrap_or_default(),
        };
        survey.validate()?;
        Ok(survey)
    }

    /// Parse and build a survey from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, SurveyError> {
        let json: JsonSurvey = serde_json::from_str(s)?;
        Self::from_json(&json)
    }

    /// Convert to the JSON document form.
    pub fn to_json(&self) -> JsonSurvey {
        JsonSurvey {
            schema: SURVEY_SCHEMA_URI.to_string(),
            survey_items: self
                .survey_items
                .iter()
                .map(|(key, item)| (key.clone(), item.to_json()))
                .collect(),
            translations: self.translations.clone(),
            max_items_per_page: self.max_items_per_page,
            prefill_rules: (!self.prefill_rules.is_empty()).then(|| self.prefill_rules.clone()),
            metadata: (!self.metadata.is_empty()).then(|| self.metadata.clone()),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json())
    }

    /// Check the tree invariants: one root group, parents that exist and are
    /// groups, and every non-root item listed exactly once by its parent.
    pub fn validate(&self) -> Result<(), StructuralError> {
        let roots: Vec<&SurveyItem> = self
            .survey_items
            .values()
            .filter(|item| item.key().is_root())
            .collect();
        match roots.as_slice() {
            [] => return Err(StructuralError::RootNotFound),
            [root] if !root.is_group() => {
                return Err(StructuralError::RootNotGroup(
                    root.key().full_key().to_string(),
                ));
            }
            [_] => {}
            _ => {
                return Err(StructuralError::MultipleRoots(
                    roots
                        .iter()
                        .map(|r| r.key().full_key().to_string())
                        .collect(),
                ));
            }
        }

        let mut listed: HashSet<&str> = HashSet::with_capacity(self.survey_items.len());
        for item in self.survey_items.values() {
            if let Some(parent_key) = item.key().parent_full_key() {
                let parent = self.survey_items.get(parent_key).ok_or_else(|| {
                    StructuralError::MissingParent {
                        key: item.key().full_key().to_string(),
                        parent: parent_key.to_string(),
                    }
                })?;
                if !parent.is_group() {
                    return Err(StructuralError::NotAGroup(parent_key.to_string()));
                }
            }
            if let Some(group) = item.as_group() {
                for child_key in &group.items {
                    let child = self
                        .survey_items
                        .get(child_key)
                        .ok_or_else(|| StructuralError::UnknownItem(child_key.clone()))?;
                    if child.key().parent_full_key() != Some(item.key().full_key()) {
                        return Err(StructuralError::NotAChild {
                            group: item.key().full_key().to_string(),
                            child: child_key.clone(),
                        });
                    }
                    if !listed.insert(child_key.as_str()) {
                        return Err(StructuralError::DuplicateKey(child_key.clone()));
                    }
                }
            }
        }

        if let Some(unlisted) = self
            .survey_items
            .values()
            .find(|item| !item.key().is_root() && !listed.contains(item.key().full_key()))
        {
            return Err(StructuralError::NotListed {
                group: unlisted
                    .key()
                    .parent_full_key()
                    .unwrap_or_default()
                    .to_string(),
                child: unlisted.key().full_key().to_string(),
            });
        }
        Ok(())
    }

    /// The root item: the one whose key has no parent.
    pub fn root_item(&self) -> Result<&SurveyItem, StructuralError> {
        self.survey_items
            .values()
            .find(|item| item.key().is_root())
            .ok_or(StructuralError::RootNotFound)
    }

    /// Look up an item by full key.
    pub fn item(&self, full_key: &str) -> Option<&SurveyItem> {
        self.survey_items.get(full_key)
    }

    /// Get an iterator over all items, ordered by full key.
    pub fn items(&self) -> impl Iterator<Item = &SurveyItem> {
        self.survey_items.values()
    }

    /// Get the number of items, groups and markers included.
    pub fn len(&self) -> usize {
        self.survey_items.len()
    }

    /// Check if the survey has no items.
    pub fn is_empty(&self) -> bool {
        self.survey_items.is_empty()
    }

    /// The direct children of a group, in declared order.
    pub fn children(&self, group_key: &str) -> Result<Vec<&SurveyItem>, StructuralError> {
        let item = self
            .item(group_key)
            .ok_or_else(|| StructuralError::UnknownItem(group_key.to_string()))?;
        let group = item
            .as_group()
            .ok_or_else(|| StructuralError::NotAGroup(group_key.to_string()))?;
        group
            .items
            .iter()
            .map(|key| {
                self.item(key)
                    .ok_or_else(|| StructuralError::UnknownItem(key.clone()))
            })
            .collect()
    }

    /// Every item reachable from the root, in declared pre-order.
    ///
    /// This is the structural order and ignores any shuffling.
    pub fn walk_pre_order(&self) -> Vec<&SurveyItem> {
        let mut out = Vec::with_capacity(self.survey_items.len());
        if let Ok(root) = self.root_item() {
            self.collect_pre_order(root, &mut out);
        }
        out
    }

    fn collect_pre_order<'a>(&'a self, item: &'a SurveyItem, out: &mut Vec<&'a SurveyItem>) {
        out.push(item);
        if let Some(group) = item.as_group() {
            for child in group.items.iter().filter_map(|key| self.item(key)) {
                self.collect_pre_order(child, out);
            }
        }
    }

    /// Every reachable non-group item, in declared pre-order.
    pub fn leaf_items(&self) -> Vec<&SurveyItem> {
        self.walk_pre_order()
            .into_iter()
            .filter(|item| !item.is_group())
            .collect()
    }

    /// The first survey end marker in declared pre-order.
    pub fn survey_end_item(&self) -> Option<&SurveyItem> {
        self.walk_pre_order()
            .into_iter()
            .find(|item| item.item_type() == SurveyItemType::SurveyEnd)
    }
}

/// The JSON document form of a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSurvey {
    #[serde(rename = "$schema", default)]
    pub schema: String,
    #[serde(default)]
    pub survey_items: SurveyItemEntries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items_per_page: Option<MaxItemsPerPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefill_rules: Option<Vec<Expression>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// The `surveyItems` object, kept as an ordered list of entries.
///
/// Unlike a map, this keeps every entry of the source document so that
/// duplicate keys can be reported instead of silently overwritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyItemEntries(Vec<(String, JsonSurveyItem)>);

impl SurveyItemEntries {
    /// Get an iterator over the entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonSurveyItem)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    /// Get the number of entries, repeated keys included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys that occur more than once, in first-repeat order.
    pub fn duplicate_keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .filter(|(key, _)| !seen.insert(key.as_str()))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Append an entry without checking for repeats.
    pub fn push(&mut self, key: impl Into<String>, item: JsonSurveyItem) {
        self.0.push((key.into(), item));
    }
}

impl FromIterator<(String, JsonSurveyItem)> for SurveyItemEntries {
    fn from_iter<I: IntoIterator<Item = (String, JsonSurveyItem)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for SurveyItemEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, item) in &self.0 {
            map.serialize_entry(key, item)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SurveyItemEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = SurveyItemEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of full item keys to survey items")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, item)) = access.next_entry::<String, JsonSurveyItem>()? {
                    entries.push((key, item));
                }
                Ok(SurveyItemEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SurveyItemKind;
    use serde_json::json;

    fn survey_json() -> serde_json::Value {
        json!({
            "$schema": SURVEY_SCHEMA_URI,
            "surveyItems": {
                "survey": { "itemType": "group", "items": ["survey.g1", "survey.end"] },
                "survey.g1": { "itemType": "group", "items": ["survey.g1.q1", "survey.g1.pb"] },
                "survey.g1.q1": { "itemType": "singleChoiceQuestion" },
                "survey.g1.pb": { "itemType": "pageBreak" },
                "survey.end": { "itemType": "surveyEnd" }
            },
            "maxItemsPerPage": { "large": 4, "small": 2 }
        })
    }

    fn parse(value: serde_json::Value) -> Result<Survey, SurveyError> {
        Survey::from_json_str(&value.to_string())
    }

    #[test]
    fn from_json_builds_tree() {
        let survey = parse(survey_json()).unwrap();
        assert_eq!(survey.len(), 5);
        assert_eq!(survey.root_item().unwrap().key().full_key(), "survey");
        let keys: Vec<_> = survey
            .walk_pre_order()
            .into_iter()
            .map(|i| i.key().full_key())
            .collect();
        assert_eq!(
            keys,
            vec!["survey", "survey.g1", "survey.g1.q1", "survey.g1.pb", "survey.end"]
        );
        assert_eq!(
            survey.max_items_per_page,
            Some(MaxItemsPerPage { large: 4, small: 2 })
        );
    }

    #[test]
    fn unsupported_schema() {
        let mut value = survey_json();
        value["$schema"] = json!("https://example.com/other.json");
        assert!(matches!(
            parse(value),
            Err(SurveyError::Schema(SchemaError::UnsupportedSchema { .. }))
        ));
    }

    #[test]
    fn missing_schema_is_unsupported() {
        let mut value = survey_json();
        value.as_object_mut().unwrap().remove("$schema");
        assert!(matches!(
            parse(value),
            Err(SurveyError::Schema(SchemaError::UnsupportedSchema { .. }))
        ));
    }

    #[test]
    fn empty_items_rejected() {
        let value = json!({ "$schema": SURVEY_SCHEMA_URI, "surveyItems": {} });
        assert!(matches!(
            parse(value),
            Err(SurveyError::Schema(SchemaError::MissingSurveyItems))
        ));
        let value = json!({ "$schema": SURVEY_SCHEMA_URI });
        assert!(matches!(
            parse(value),
            Err(SurveyError::Schema(SchemaError::MissingSurveyItems))
        ));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let raw = format!(
            r#"{{
                "$schema": "{SURVEY_SCHEMA_URI}",
                "surveyItems": {{
                    "survey": {{ "itemType": "group", "items": ["survey.q1"] }},
                    "survey.q1": {{ "itemType": "display" }},
                    "survey.q1": {{ "itemType": "pageBreak" }}
                }}
            }}"#
        );
        let json: JsonSurvey = serde_json::from_str(&raw).unwrap();
        assert_eq!(json.survey_items.duplicate_keys(), vec!["survey.q1"]);
        assert!(matches!(
            Survey::from_json(&json),
            Err(SurveyError::Structural(StructuralError::DuplicateKey(k))) if k == "survey.q1"
        ));
    }

    #[test]
    fn root_not_found() {
        let value = json!({
            "$schema": SURVEY_SCHEMA_URI,
            "surveyItems": { "survey.q1": { "itemType": "display" } }
        });
        let err = parse(value).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn multiple_roots_rejected() {
        let value = json!({
            "$schema": SURVEY_SCHEMA_URI,
            "surveyItems": {
                "a": { "itemType": "group" },
                "b": { "itemType": "group" }
            }
        });
        assert!(matches!(
            parse(value),
            Err(SurveyError::Structural(StructuralError::MultipleRoots(_)))
        ));
    }

    #[test]
    fn missing_parent_rejected() {
        let mut value = survey_json();
        value["surveyItems"]["survey.nowhere.q9"] = json!({ "itemType": "display" });
        assert!(matches!(
            parse(value),
            Err(SurveyError::Structural(StructuralError::MissingParent { .. }))
        ));
    }

    #[test]
    fn unknown_child_rejected() {
        let mut value = survey_json();
        value["surveyItems"]["survey"]["items"] = json!(["survey.g1", "survey.ghost"]);
        assert!(matches!(
            parse(value),
            Err(SurveyError::Structural(StructuralError::UnknownItem(k))) if k == "survey.ghost"
        ));
    }

    #[test]
    fn repeated_child_rejected() {
        let mut value = survey_json();
        value["surveyItems"]["survey.g1"]["items"] =
            json!(["survey.g1.q1", "survey.g1.q1", "survey.g1.pb"]);
        assert!(matches!(
            parse(value),
            Err(SurveyError::Structural(StructuralError::DuplicateKey(k))) if k == "survey.g1.q1"
        ));
    }

    #[test]
    fn child_of_non_group_rejected() {
        let mut value = survey_json();
        value["surveyItems"]["survey.g1.q1.x"] = json!({ "itemType": "display" });
        assert!(matches!(
            parse(value),
            Err(SurveyError::Structural(StructuralError::NotAGroup(k))) if k == "survey.g1.q1"
        ));
    }

    #[test]
    fn unlisted_child_rejected() {
        let mut value = survey_json();
        value["surveyItems"]["survey.orphan"] = json!({ "itemType": "display" });
        assert_eq!(
            parse(value).unwrap_err().to_string(),
            "Item 'survey.orphan' has parent 'survey' but is not listed in its items"
        );
    }

    #[test]
    fn malformed_key_rejected() {
        let mut value = survey_json();
        value["surveyItems"]["survey.g1."] = json!({ "itemType": "display" });
        assert!(parse(value).unwrap_err().is_key_error());
    }

    #[test]
    fn json_round_trip() {
        let survey = parse(survey_json()).unwrap();
        let again = Survey::from_json_str(&survey.to_json_string().unwrap()).unwrap();
        assert_eq!(again.len(), survey.len());
        for item in survey.items() {
            let other = again.item(item.key().full_key()).unwrap();
            assert_eq!(other.item_type(), item.item_type());
            assert_eq!(other.key(), item.key());
        }
        assert_eq!(again, survey);
    }

    #[test]
    fn build_programmatically() {
        let mut survey = Survey::new("survey").unwrap();
        let root = survey.root_item().unwrap().key().clone();
        survey
            .add_item(SurveyItem::group(root.child("g1").unwrap(), Some(true)))
            .unwrap();
        let q1 = SurveyItem::content(
            SurveyItemKey::parse("survey.g1.q1").unwrap(),
            SurveyItemType::MultipleChoiceQuestion,
        )
        .unwrap();
        survey.add_item(q1.clone()).unwrap();
        assert_eq!(
            survey.add_item(q1),
            Err(StructuralError::DuplicateKey("survey.g1.q1".into()))
        );
        assert!(matches!(
            survey.add_item(SurveyItem::page_break(
                SurveyItemKey::parse("survey.g1.q1.pb").unwrap()
            )),
            Err(StructuralError::NotAGroup(_))
        ));
        survey.validate().unwrap();

        let children = survey.children("survey.g1").unwrap();
        assert_eq!(children.len(), 1);
        assert!(matches!(
            survey.item("survey.g1").unwrap().kind,
            SurveyItemKind::Group(ref g) if g.is_shuffled()
        ));
    }

    #[test]
    fn survey_end_in_structural_order() {
        let survey = parse(survey_json()).unwrap();
        assert_eq!(
            survey.survey_end_item().unwrap().key().full_key(),
            "survey.end"
        );
        assert_eq!(survey.leaf_items().len(), 3);
    }
}
