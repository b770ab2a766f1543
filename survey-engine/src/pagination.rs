use serde::{Deserialize, Serialize};
use survey_engine_types::MaxItemsPerPage;

/// Which page size limit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceClass {
    Large,
    Small,
}

impl DeviceClass {
    /// The limit for this device class. `None` means unlimited.
    pub fn page_limit(self, limits: &MaxItemsPerPage) -> Option<usize> {
        let limit = match self {
            Self::Large => limits.large,
            Self::Small => limits.small,
        };
        (limit > 0).then_some(limit)
    }
}

/// Split a flattened leaf sequence into pages.
///
/// Items for which `is_page_break` holds end the current page and are dropped.
/// Each resulting segment is then chunked into pages of at most
/// `max_items_per_page` items. Empty segments produce no page, and a limit of
/// `0` is treated as no limit.
pub fn paginate<T>(
    items: impl IntoIterator<Item = T>,
    is_page_break: impl Fn(&T) -> bool,
    max_items_per_page: Option<usize>,
) -> Vec<Vec<T>> {
    let limit = max_items_per_page.filter(|&n| n > 0);
    let mut pages = Vec::new();
    let mut current = Vec::new();
    for item in items {
        if is_page_break(&item) {
            if !current.is_empty() {
                pages.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(item);
        if limit.is_some_and(|n| current.len() == n) {
            pages.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        pages.push(current);
    }
    pages
}
