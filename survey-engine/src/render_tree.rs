//! Render order of a survey.
//!
//! The render tree mirrors the group hierarchy of a [`Survey`] with each
//! group's children in the order they are shown. Groups with `shuffle_items`
//! get their direct children permuted; every other group keeps its declared
//! order. Nested groups decide for themselves.

use rand::Rng;
use rand::seq::SliceRandom;
use survey_engine_types::{StructuralError, Survey, SurveyItem, SurveyItemType};
use tracing::trace;

/// A node of the render tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedItem {
    Group {
        key: String,
        items: Vec<RenderedItem>,
    },
    Leaf {
        key: String,
        item_type: SurveyItemType,
    },
}

impl RenderedItem {
    /// Full key of the item.
    pub fn key(&self) -> &str {
        match self {
            Self::Group { key, .. } | Self::Leaf { key, .. } => key,
        }
    }

    pub fn item_type(&self) -> SurveyItemType {
        match self {
            Self::Group { .. } => SurveyItemType::Group,
            Self::Leaf { item_type, .. } => *item_type,
        }
    }

    /// Children in render order. Empty for leaves.
    pub fn children(&self) -> &[RenderedItem] {
        match self {
            Self::Group { items, .. } => items,
            Self::Leaf { .. } => &[],
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a RenderedItem>) {
        match self {
            Self::Group { items, .. } => items.iter().for_each(|item| item.collect_leaves(out)),
            Self::Leaf { .. } => out.push(self),
        }
    }

    fn find(&self, full_key: &str) -> Option<&RenderedItem> {
        if self.key() == full_key {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(full_key))
    }

    fn pruned(&self, keep: &mut impl FnMut(&RenderedItem) -> bool) -> Option<RenderedItem> {
        if !keep(self) {
            return None;
        }
        Some(match self {
            Self::Group { key, items } => Self::Group {
                key: key.clone(),
                items: items.iter().filter_map(|item| item.pruned(keep)).collect(),
            },
            Self::Leaf { .. } => self.clone(),
        })
    }
}

/// The render tree of one engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSurveyTree {
    root: RenderedItem,
}

impl RenderedSurveyTree {
    /// Build the render tree of `survey`, shuffling with `rng` where requested.
    pub fn build<R: Rng + ?Sized>(survey: &Survey, rng: &mut R) -> Result<Self, StructuralError> {
        let root = build_item(survey, survey.root_item()?, rng)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &RenderedItem {
        &self.root
    }

    /// All non-group items, flattened in render order.
    pub fn leaves(&self) -> Vec<&RenderedItem> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    /// Find a node by full key.
    pub fn find(&self, full_key: &str) -> Option<&RenderedItem> {
        self.root.find(full_key)
    }

    /// Index of a leaf in the flattened render order.
    pub fn position_of(&self, full_key: &str) -> Option<usize> {
        self.leaves().iter().position(|leaf| leaf.key() == full_key)
    }

    /// A copy of the tree without the items `keep` rejects.
    ///
    /// A rejected group drops its whole subtree. The root is always kept.
    pub fn pruned(&self, mut keep: impl FnMut(&RenderedItem) -> bool) -> Self {
        let items = self
            .root
            .children()
            .iter()
            .filter_map(|item| item.pruned(&mut keep))
            .collect();
        Self {
            root: RenderedItem::Group {
                key: self.root.key().to_string(),
                items,
            },
        }
    }
}

fn build_item<R: Rng + ?Sized>(
    survey: &Survey,
    item: &SurveyItem,
    rng: &mut R,
) -> Result<RenderedItem, StructuralError> {
    let key = item.key().full_key().to_string();
    let Some(group) = item.as_group() else {
        return Ok(RenderedItem::Leaf {
            key,
            item_type: item.item_type(),
        });
    };

    let mut children = survey.children(&key)?;
    if group.is_shuffled() {
        children.shuffle(rng);
        trace!(group = %key, count = children.len(), "Shuffled group items");
    }
    let items = children
        .into_iter()
        .map(|child| build_item(survey, child, rng))
        .collect::<Result<_, _>>()?;
    Ok(RenderedItem::Group { key, items })
}
