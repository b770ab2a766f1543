/// Error type for malformed item or component keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The leaf segment is empty.
    #[error("Key segment must not be empty")]
    EmptyKey,

    /// The leaf segment contains a dot.
    #[error("Key segment '{0}' must not contain '.'")]
    DotInItemKey(String),

    /// The parent key starts or ends with a dot.
    #[error("Parent key '{0}' must not start or end with '.'")]
    MalformedParentKey(String),
}

/// Error type for survey documents that cannot be accepted at all.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Unsupported survey schema: expected '{expected}', found '{found}'")]
    UnsupportedSchema {
        expected: &'static str,
        found: String,
    },

    #[error("Survey contains no items")]
    MissingSurveyItems,

    #[error("Component '{component}' of item '{item}' cannot have child components")]
    UnexpectedChildren { item: String, component: String },

    #[error("Invalid survey JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error type for survey trees whose items do not fit together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("Survey has no root item")]
    RootNotFound,

    #[error("Survey has more than one root item: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("Root item '{0}' is not a group")]
    RootNotGroup(String),

    #[error("Duplicate item key: {0}")]
    DuplicateKey(String),

    #[error("Parent '{parent}' of item '{key}' does not exist")]
    MissingParent { key: String, parent: String },

    #[error("Unknown item key: {0}")]
    UnknownItem(String),

    #[error("Item '{child}' is listed in group '{group}' but is not its direct child")]
    NotAChild { group: String, child: String },

    #[error("Item '{child}' has parent '{group}' but is not listed in its items")]
    NotListed { group: String, child: String },

    #[error("Item '{0}' is not a group")]
    NotAGroup(String),
}

/// Error type for building or importing a survey.
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl SurveyError {
    /// Check if this error was caused by a malformed key.
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::Key(_))
    }

    /// Check if this error was caused by an inconsistent item tree.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

impl From<serde_json::Error> for SurveyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(SchemaError::Json(err))
    }
}
