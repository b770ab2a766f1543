use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Expression, ExpressionType, ItemComponentKey, SchemaError, SurveyError, SurveyItemKey};

/// The runtime type tag of a survey item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurveyItemType {
    Group,
    Display,
    PageBreak,
    SurveyEnd,
    SingleChoiceQuestion,
    MultipleChoiceQuestion,
}

impl SurveyItemType {
    /// Check if items of this type collect a response.
    pub fn is_question(self) -> bool {
        matches!(
            self,
            Self::SingleChoiceQuestion | Self::MultipleChoiceQuestion
        )
    }
}

/// A single item of a survey: a group, a marker, or a content item.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyItem {
    key: SurveyItemKey,
    pub metadata: BTreeMap<String, String>,
    pub condition: Option<Expression>,
    pub follows: Vec<String>,
    pub priority: Option<f64>,
    pub kind: SurveyItemKind,
}

/// The variant-specific payload of a survey item.
#[derive(Debug, Clone, PartialEq)]
pub enum SurveyItemKind {
    /// An ordered group of child items.
    Group(GroupItem),

    /// Static content.
    Display(ContentItem),

    /// Pick one option.
    SingleChoiceQuestion(ContentItem),

    /// Pick any number of options.
    MultipleChoiceQuestion(ContentItem),

    /// Marks the end of a page.
    PageBreak,

    /// Marks the end of the survey.
    SurveyEnd,
}

impl SurveyItem {
    /// Create an item with the given key and payload.
    pub fn new(key: SurveyItemKey, kind: SurveyItemKind) -> Self {
        Self {
            key,
            metadata: BTreeMap::new(),
            condition: None,
            follows: Vec::new(),
            priority: None,
            kind,
        }
    }

    /// Create an empty group.
    pub fn group(key: SurveyItemKey, shuffle_items: Option<bool>) -> Self {
        Self::new(
            key,
            SurveyItemKind::Group(GroupItem {
                items: Vec::new(),
                shuffle_items,
            }),
        )
    }

    /// Create a page break marker.
    pub fn page_break(key: SurveyItemKey) -> Self {
        Self::new(key, SurveyItemKind::PageBreak)
    }

    /// Create a survey end marker.
    pub fn survey_end(key: SurveyItemKey) -> Self {
        Self::new(key, SurveyItemKind::SurveyEnd)
    }

    /// Create a content item of the given type with no components.
    ///
    /// Returns `None` for group and marker types.
    pub fn content(key: SurveyItemKey, item_type: SurveyItemType) -> Option<Self> {
        let content = ContentItem::default();
        let kind = match item_type {
            SurveyItemType::Display => SurveyItemKind::Display(content),
            SurveyItemType::SingleChoiceQuestion => SurveyItemKind::SingleChoiceQuestion(content),
            SurveyItemType::MultipleChoiceQuestion => {
                SurveyItemKind::MultipleChoiceQuestion(content)
            }
            SurveyItemType::Group | SurveyItemType::PageBreak | SurveyItemType::SurveyEnd => {
                return None;
            }
        };
        Some(Self::new(key, kind))
    }

    /// The item's key.
    pub fn key(&self) -> &SurveyItemKey {
        &self.key
    }

    /// The runtime type tag, derived from the payload.
    pub fn item_type(&self) -> SurveyItemType {
        match &self.kind {
            SurveyItemKind::Group(_) => SurveyItemType::Group,
            SurveyItemKind::Display(_) => SurveyItemType::Display,
            SurveyItemKind::SingleChoiceQuestion(_) => SurveyItemType::SingleChoiceQuestion,
            SurveyItemKind::MultipleChoiceQuestion(_) => SurveyItemType::MultipleChoiceQuestion,
            SurveyItemKind::PageBreak => SurveyItemType::PageBreak,
            SurveyItemKind::SurveyEnd => SurveyItemType::SurveyEnd,
        }
    }

    /// Check if this item is a group.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, SurveyItemKind::Group(_))
    }

    /// The group payload, if this item is a group.
    pub fn as_group(&self) -> Option<&GroupItem> {
        match &self.kind {
            SurveyItemKind::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Mutable access to the group payload.
    pub fn as_group_mut(&mut self) -> Option<&mut GroupItem> {
        match &mut self.kind {
            SurveyItemKind::Group(group) => Some(group),
            _ => None,
        }
    }

    /// The content payload of display and question items.
    pub fn content_item(&self) -> Option<&ContentItem> {
        match &self.kind {
            SurveyItemKind::Display(content)
            | SurveyItemKind::SingleChoiceQuestion(content)
            | SurveyItemKind::MultipleChoiceQuestion(content) => Some(content),
            SurveyItemKind::Group(_) | SurveyItemKind::PageBreak | SurveyItemKind::SurveyEnd => {
                None
            }
        }
    }

    /// Build an item from its JSON form, stored under `full_key`.
    pub fn from_json(full_key: &str, json: &JsonSurveyItem) -> Result<Self, SurveyError> {
        let key = SurveyItemKey::parse(full_key)?;
        let kind = match json.item_type {
            SurveyItemType::Group => SurveyItemKind::Group(GroupItem {
                items: json.items.clone().unwrap_or_default(),
                shuffle_items: json.shuffle_items,
            }),
            SurveyItemType::PageBreak => SurveyItemKind::PageBreak,
            SurveyItemType::SurveyEnd => SurveyItemKind::SurveyEnd,
            SurveyItemType::Display => SurveyItemKind::Display(ContentItem::from_json(full_key, json)?),
            SurveyItemType::SingleChoiceQuestion => {
                SurveyItemKind::SingleChoiceQuestion(ContentItem::from_json(full_key, json)?)
            }
            SurveyItemType::MultipleChoiceQuestion => {
                SurveyItemKind::MultipleChoiceQuestion(ContentItem::from_json(full_key, json)?)
            }
        };
        Ok(Self {
            key,
            metadata: json.metadata.clone().unwrap_or_default(),
            condition: json.condition.clone(),
            follows: json.follows.clone().unwrap_or_default(),
            priority: json.priority,
            kind,
        })
    }

    /// Convert this item to its JSON form.
    pub fn to_json(&self) -> JsonSurveyItem {
        let mut json = JsonSurveyItem {
            item_type: self.item_type(),
            metadata: (!self.metadata.is_empty()).then(|| self.metadata.clone()),
            condition: self.condition.clone(),
            follows: (!self.follows.is_empty()).then(|| self.follows.clone()),
            priority: self.priority,
            ..JsonSurveyItem::new(self.item_type())
        };
        match &self.kind {
            SurveyItemKind::Group(group) => {
                json.items = Some(group.items.clone());
                json.shuffle_items = group.shuffle_items;
            }
            SurveyItemKind::Display(content)
            | SurveyItemKind::SingleChoiceQuestion(content)
            | SurveyItemKind::MultipleChoiceQuestion(content) => content.write_json(&mut json),
            SurveyItemKind::PageBreak | SurveyItemKind::SurveyEnd => {}
        }
        json
    }
}

/// Payload of a group item.
///
/// Children are stored as full keys; the items themselves live in the survey's
/// item map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupItem {
    pub items: Vec<String>,
    pub shuffle_items: Option<bool>,
}

impl GroupItem {
    /// Whether the children should be rendered in random order.
    pub fn is_shuffled(&self) -> bool {
        self.shuffle_items.unwrap_or(false)
    }
}

/// Payload of display and question items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentItem {
    pub components: Vec<ItemComponent>,
    pub display_conditions: Option<DisplayConditions>,
    pub disabled_conditions: Option<DisabledConditions>,
    pub validations: Option<BTreeMap<String, Expression>>,
    pub template_values: Option<BTreeMap<String, TemplateValueDefinition>>,
}

impl ContentItem {
    fn from_json(item_full_key: &str, json: &JsonSurveyItem) -> Result<Self, SurveyError> {
        let components = json
            .components
            .iter()
            .flatten()
            .map(|component| ItemComponent::from_json(component, None, item_full_key))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            components,
            display_conditions: json.display_conditions.clone(),
            disabled_conditions: json.disabled_conditions.clone(),
            validations: json.validations.clone(),
            template_values: json.template_values.clone(),
        })
    }

    fn write_json(&self, json: &mut JsonSurveyItem) {
        json.components = (!self.components.is_empty())
            .then(|| self.components.iter().map(ItemComponent::to_json).collect());
        json.display_conditions = self.display_conditions.clone();
        json.disabled_conditions = self.disabled_conditions.clone();
        json.validations = self.validations.clone();
        json.template_values = self.template_values.clone();
    }

    /// Find a component anywhere in the component tree by its full key.
    pub fn find_component(&self, full_key: &str) -> Option<&ItemComponent> {
        self.components.iter().find_map(|c| c.find(full_key))
    }

    /// The root display condition, if declared.
    pub fn root_display_condition(&self) -> Option<&Expression> {
        self.display_conditions.as_ref()?.root.as_ref()
    }

    /// The display condition of a component, if declared.
    pub fn component_display_condition(&self, component_key: &str) -> Option<&Expression> {
        self.display_conditions.as_ref()?.components.get(component_key)
    }

    /// The disabled condition of a component, if declared.
    pub fn component_disabled_condition(&self, component_key: &str) -> Option<&Expression> {
        self.disabled_conditions
            .as_ref()?
            .components
            .get(component_key)
    }

    /// Declared validations; `None` when absent or empty.
    pub fn declared_validations(&self) -> Option<&BTreeMap<String, Expression>> {
        self.validations.as_ref().filter(|v| !v.is_empty())
    }

    pub fn template_value(&self, template_key: &str) -> Option<&TemplateValueDefinition> {
        self.template_values.as_ref()?.get(template_key)
    }
}

/// Display conditions of an item: one for the whole item and one per component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<Expression>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, Expression>,
}

/// Disabled conditions of an item, keyed by component full key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisabledConditions {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, Expression>,
}

/// How a template value is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateMode {
    /// Evaluate and cast to the declared return type.
    #[default]
    Default,

    /// Evaluate to a date and format it with `date_format`.
    Date2String,
}

/// Date pattern used when a `Date2String` template declares none.
pub const DEFAULT_DATE_FORMAT: &str = "dd/MM/yyyy";

/// A value computed from an expression and substituted into item content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateValueDefinition {
    #[serde(rename = "type", default)]
    pub mode: TemplateMode,
    pub return_type: ExpressionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

/// The kind of an item component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemComponentType {
    Text,
    Markdown,
    Group,
    SingleChoice,
    MultipleChoice,
    ScgMcgOption,
}

impl ItemComponentType {
    /// Check if components of this type may own children.
    pub fn has_children(self) -> bool {
        matches!(self, Self::Group | Self::SingleChoice | Self::MultipleChoice)
    }
}

/// A node of an item's component tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemComponent {
    key: ItemComponentKey,
    pub component_type: ItemComponentType,
    pub props: BTreeMap<String, serde_json::Value>,
    pub items: Vec<ItemComponent>,
}

impl ItemComponent {
    /// Create a component without props or children.
    pub fn new(key: ItemComponentKey, component_type: ItemComponentType) -> Self {
        Self {
            key,
            component_type,
            props: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    /// The component's key within its item.
    pub fn key(&self) -> &ItemComponentKey {
        &self.key
    }

    /// Find this component or a descendant by full key.
    pub fn find(&self, full_key: &str) -> Option<&ItemComponent> {
        if self.key.full_key() == full_key {
            return Some(self);
        }
        self.items.iter().find_map(|c| c.find(full_key))
    }

    /// This component and all descendants, in pre-order.
    pub fn walk(&self) -> Vec<&ItemComponent> {
        let mut out = vec![self];
        for child in &self.items {
            out.extend(child.walk());
        }
        out
    }

    fn from_json(
        json: &JsonItemComponent,
        parent_full_key: Option<&str>,
        item_full_key: &str,
    ) -> Result<Self, SurveyError> {
        let key = ItemComponentKey::new(&json.key, parent_full_key, item_full_key)?;
        let has_items = json.items.as_ref().is_some_and(|items| !items.is_empty());
        if has_items && !json.component_type.has_children() {
            return Err(SchemaError::UnexpectedChildren {
                item: item_full_key.to_string(),
                component: key.full_key().to_string(),
            }
            .into());
        }
        let items = json
            .items
            .iter()
            .flatten()
            .map(|child| Self::from_json(child, Some(key.full_key()), item_full_key))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            key,
            component_type: json.component_type,
            props: json.props.clone().unwrap_or_default(),
            items,
        })
    }

    fn to_json(&self) -> JsonItemComponent {
        JsonItemComponent {
            key: self.key.component_key().to_string(),
            component_type: self.component_type,
            props: (!self.props.is_empty()).then(|| self.props.clone()),
            items: (!self.items.is_empty()).then(|| self.items.iter().map(Self::to_json).collect()),
        }
    }
}

/// The JSON form of a survey item, stored flat under its full key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSurveyItem {
    pub item_type: SurveyItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follows: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_items: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<JsonItemComponent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_conditions: Option<DisplayConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_conditions: Option<DisabledConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<BTreeMap<String, Expression>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_values: Option<BTreeMap<String, TemplateValueDefinition>>,
}

impl JsonSurveyItem {
    /// An item of the given type with every optional field absent.
    pub fn new(item_type: SurveyItemType) -> Self {
        Self {
            item_type,
            metadata: None,
            condition: None,
            follows: None,
            priority: None,
            items: None,
            shuffle_items: None,
            components: None,
            display_conditions: None,
            disabled_conditions: None,
            validations: None,
            template_values: None,
        }
    }
}

/// The JSON form of an item component. `key` is the leaf segment only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonItemComponent {
    pub key: String,
    pub component_type: ItemComponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<JsonItemComponent>>,
}
