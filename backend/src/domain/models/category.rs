//! Domain model for a spending category.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-defined spending bucket.
///
/// Categories are independently owned: items reference them by id only, and
/// deleting a category leaves those references dangling. Every read site
/// resolves a dangling reference to "no category".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Free text, also consumed by the classifier as a hint.
    pub description: String,
    /// Display color as `#rrggbb`.
    pub color: String,
    /// Monthly spending limit in minor units; 0 means no limit is set.
    pub monthly_limit: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields of a category about to be created; the store assigns the rest.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub color: String,
    pub monthly_limit: i64,
}

/// Full in-place replacement of the mutable category fields.
#[derive(Debug, Clone)]
pub struct CategoryUpdate {
    pub name: String,
    pub description: String,
    pub color: String,
    pub monthly_limit: i64,
}
