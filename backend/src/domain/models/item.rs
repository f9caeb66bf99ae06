//! Domain model for a payment line item.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line entry belonging to a payment.
///
/// Items are lifecycle-bound to their payment: they are only created as
/// children of one, and deleting the payment deletes them. The category
/// reference is weak; it may dangle after a category is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub payment_id: i64,
    pub name: String,
    /// Quantity; fractional for weighed goods.
    pub qty: f64,
    /// Line total in minor currency units.
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Fields of an item about to be created; the store assigns id and
/// timestamp. `payment_id` is immutable after creation.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub payment_id: i64,
    pub name: String,
    pub qty: f64,
    pub price: i64,
    pub category_id: Option<i64>,
}

/// Partial item edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub qty: Option<f64>,
    pub price: Option<i64>,
    pub category_id: Option<i64>,
}
