use std::fmt;

use serde::{Deserialize, Serialize};

use crate::KeyError;

/// Validate a leaf segment and an optional parent key, returning the derived full key.
fn build_full_key(key: &str, parent_full_key: Option<&str>) -> Result<String, KeyError> {
    if key.is_empty() {
        return Err(KeyError::EmptyKey);
    }
    if key.contains('.') {
        return Err(KeyError::DotInItemKey(key.to_string()));
    }
    match parent_full_key {
        Some(parent) if parent.starts_with('.') || parent.ends_with('.') => {
            Err(KeyError::MalformedParentKey(parent.to_string()))
        }
        Some(parent) if !parent.is_empty() => Ok(format!("{parent}.{key}")),
        _ => Ok(key.to_string()),
    }
}

/// Split a full key at its last dot into `(parent, leaf)`.
///
/// The parent is empty when the full key has a single segment. A leading dot
/// is rejected here since it would otherwise read as an empty parent.
fn split_full_key(full_key: &str) -> Result<(&str, &str), KeyError> {
    if full_key.starts_with('.') {
        return Err(KeyError::MalformedParentKey(full_key.to_string()));
    }
    Ok(match full_key.rfind('.') {
        Some(idx) => (&full_key[..idx], &full_key[idx + 1..]),
        None => ("", full_key),
    })
}

/// The key of a survey item, e.g. `"survey.intro.q1"`.
///
/// Keys are hierarchical: the leaf segment (`item_key`) is joined to the
/// parent's full key with a dot. A key constructed without a parent is a root
/// key. Note that an explicit empty parent is *not* the same as no parent:
/// `SurveyItemKey::new("q1", Some(""))` has full key `"q1"` but is not a root.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SurveyItemKey {
    item_key: String,
    parent_full_key: Option<String>,
    full_key: String,
}

impl SurveyItemKey {
    /// Create a key from a leaf segment and an optional parent full key.
    pub fn new(
        item_key: impl Into<String>,
        parent_full_key: Option<&str>,
    ) -> Result<Self, KeyError> {
        let item_key = item_key.into();
        let full_key = build_full_key(&item_key, parent_full_key)?;
        Ok(Self {
            item_key,
            parent_full_key: parent_full_key.map(str::to_string),
            full_key,
        })
    }

    /// Create a root key (no parent).
    pub fn root(item_key: impl Into<String>) -> Result<Self, KeyError> {
        Self::new(item_key, None)
    }

    /// Create a key from a full key, always passing an explicit parent.
    ///
    /// The resulting key is never a root key, even for single-segment input.
    pub fn from_full_key(full_key: &str) -> Result<Self, KeyError> {
        let (parent, leaf) = split_full_key(full_key)?;
        Self::new(leaf, Some(parent))
    }

    /// Parse a full key as stored in survey JSON.
    ///
    /// A single-segment key is a root key; anything else has a parent.
    pub fn parse(full_key: &str) -> Result<Self, KeyError> {
        match split_full_key(full_key)? {
            ("", leaf) => Self::root(leaf),
            (parent, leaf) => Self::new(leaf, Some(parent)),
        }
    }

    /// The leaf segment of this key.
    pub fn item_key(&self) -> &str {
        &self.item_key
    }

    /// The parent's full key, if one was supplied.
    pub fn parent_full_key(&self) -> Option<&str> {
        self.parent_full_key.as_deref()
    }

    /// The full dot-separated key.
    pub fn full_key(&self) -> &str {
        &self.full_key
    }

    /// The segments of the full key, in order.
    pub fn key_parts(&self) -> Vec<&str> {
        self.full_key.split('.').collect()
    }

    /// Whether this key was constructed without a parent.
    pub fn is_root(&self) -> bool {
        self.parent_full_key.is_none()
    }

    /// Create the key of a direct child of this item.
    pub fn child(&self, item_key: impl Into<String>) -> Result<Self, KeyError> {
        Self::new(item_key, Some(&self.full_key))
    }

    /// Check whether this key lies strictly below `ancestor` in the hierarchy.
    pub fn is_descendant_of(&self, ancestor: &SurveyItemKey) -> bool {
        self.full_key
            .strip_prefix(ancestor.full_key())
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for SurveyItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_key)
    }
}

impl TryFrom<String> for SurveyItemKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for SurveyItemKey {
    type Error = KeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<SurveyItemKey> for String {
    fn from(key: SurveyItemKey) -> Self {
        key.full_key
    }
}

/// The key of a component inside a survey item, e.g. `"rg.scg.option1"`.
///
/// Has the same shape as [`SurveyItemKey`] for the component path, plus a
/// back-reference to the key of the item owning the component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemComponentKey {
    component_key: String,
    parent_full_key: Option<String>,
    full_key: String,
    parent_item_key: SurveyItemKey,
}

impl ItemComponentKey {
    /// Create a component key belonging to the item with full key `item_full_key`.
    pub fn new(
        component_key: impl Into<String>,
        parent_full_key: Option<&str>,
        item_full_key: &str,
    ) -> Result<Self, KeyError> {
        let component_key = component_key.into();
        let full_key = build_full_key(&component_key, parent_full_key)?;
        Ok(Self {
            component_key,
            parent_full_key: parent_full_key.map(str::to_string),
            full_key,
            parent_item_key: SurveyItemKey::parse(item_full_key)?,
        })
    }

    /// Parse a component full key for the given item.
    ///
    /// Single-segment keys are root components of the item.
    pub fn parse(full_key: &str, item_full_key: &str) -> Result<Self, KeyError> {
        match split_full_key(full_key)? {
            ("", leaf) => Self::new(leaf, None, item_full_key),
            (parent, leaf) => Self::new(leaf, Some(parent), item_full_key),
        }
    }

    /// The leaf segment of this component key.
    pub fn component_key(&self) -> &str {
        &self.component_key
    }

    /// The parent component's full key, if any.
    pub fn parent_full_key(&self) -> Option<&str> {
        self.parent_full_key.as_deref()
    }

    /// The full dot-separated component key.
    pub fn full_key(&self) -> &str {
        &self.full_key
    }

    /// The segments of the full component key.
    pub fn key_parts(&self) -> Vec<&str> {
        self.full_key.split('.').collect()
    }

    /// Whether this component sits directly under its item.
    pub fn is_root(&self) -> bool {
        self.parent_full_key.is_none()
    }

    /// The key of the item that owns this component.
    pub fn parent_item_key(&self) -> &SurveyItemKey {
        &self.parent_item_key
    }

    /// Create the key of a direct child component.
    pub fn child(&self, component_key: impl Into<String>) -> Result<Self, KeyError> {
        Self::new(
            component_key,
            Some(&self.full_key),
            self.parent_item_key.full_key(),
        )
    }
}

impl fmt::Display for ItemComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_key)
    }
}
