//! Classification mapping rules.
//!
//! The model's raw mapping is advisory: it can omit items, reference items
//! that were never sent, or name categories that don't exist. These rules
//! turn it into a mapping that is safe to apply.

use std::collections::HashMap;

use crate::ai::ItemToClassify;
use crate::domain::models::Category;

/// Name of the designated fallback bucket.
pub const MISC_CATEGORY_NAME: &str = "Прочее";

/// Resolve a raw model mapping against the actual items and categories.
///
/// An empty raw mapping means the classification failed upstream; nothing
/// changes. Otherwise every *requested* item ends up categorized: the
/// model's choice when both ids are valid, the fallback category for
/// everything else.
pub fn resolve_mapping(
    items: &[ItemToClassify],
    categories: &[Category],
    raw: &HashMap<i64, i64>,
) -> HashMap<i64, i64> {
    if raw.is_empty() {
        return HashMap::new();
    }
    let Some(fallback_id) = fallback_category(categories) else {
        return HashMap::new();
    };

    items
        .iter()
        .map(|item| {
            let mapped = raw
                .get(&item.id)
                .filter(|category_id| categories.iter().any(|c| c.id == **category_id));
            (item.id, mapped.copied().unwrap_or(fallback_id))
        })
        .collect()
}

/// The fallback bucket: the category named «Прочее», or the lexically last
/// category by name when no such category exists.
pub fn fallback_category(categories: &[Category]) -> Option<i64> {
    categories
        .iter()
        .find(|c| c.name == MISC_CATEGORY_NAME)
        .or_else(|| categories.iter().max_by(|a, b| a.name.cmp(&b.name)))
        .map(|c| c.id)
}
