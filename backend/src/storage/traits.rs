//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer. The
//! shipped backend keeps one JSON array per entity type on disk; a real
//! embedded database could be slotted in behind the same traits without
//! touching any call site.

use anyhow::Result;

use crate::domain::models::{
    BalanceTotals, Category, CategoryUpdate, Item, ItemUpdate, NewCategory, NewItem, NewPayment,
    Payment, PaymentTotalsUpdate,
};

/// Storage operations for spending categories.
pub trait CategoryStorage: Send + Sync {
    /// Store a new category and return it with its assigned id.
    fn store_category(&self, new: NewCategory) -> Result<Category>;

    /// Retrieve a specific category by id.
    fn get_category(&self, id: i64) -> Result<Option<Category>>;

    /// List all categories ordered by name.
    fn list_categories(&self) -> Result<Vec<Category>>;

    /// Replace the mutable fields of an existing category.
    /// A missing id is an idempotent no-op.
    fn update_category(&self, id: i64, update: CategoryUpdate) -> Result<()>;

    /// Delete a category by id. Does not cascade: items keep their (now
    /// dangling) reference and read sites resolve it to "no category".
    fn delete_category(&self, id: i64) -> Result<()>;
}

/// Storage operations for payments.
pub trait PaymentStorage: Send + Sync {
    /// Store a new payment and return it with its assigned id.
    fn store_payment(&self, new: NewPayment) -> Result<Payment>;

    /// Retrieve a specific payment by id.
    fn get_payment(&self, id: i64) -> Result<Option<Payment>>;

    /// Find the payment recorded from an identical raw QR string, if any.
    /// This is the dedupe lookup the ingestion workflow relies on.
    fn find_payment_by_raw_qr(&self, raw_qr: &str) -> Result<Option<Payment>>;

    /// List all payments ordered by timestamp descending.
    fn list_payments(&self) -> Result<Vec<Payment>>;

    /// Replace totals and description of an existing payment.
    /// A missing id is an idempotent no-op.
    fn update_payment_totals(&self, id: i64, update: PaymentTotalsUpdate) -> Result<()>;

    /// Delete a payment by id.
    /// Returns true if the payment existed. Items are cascaded by the
    /// caller through [`ItemStorage::delete_items_for_payment`].
    fn delete_payment(&self, id: i64) -> Result<bool>;

    /// Aggregate the 50/50 balance over payments with a positive total.
    fn balance_totals(&self) -> Result<BalanceTotals>;
}

/// Storage operations for payment line items.
pub trait ItemStorage: Send + Sync {
    /// Store a new item and return it with its assigned id.
    fn store_item(&self, new: NewItem) -> Result<Item>;

    /// List all items of a payment in insertion order.
    fn list_items_for_payment(&self, payment_id: i64) -> Result<Vec<Item>>;

    /// List the items of a payment that have no category yet.
    fn list_uncategorized_for_payment(&self, payment_id: i64) -> Result<Vec<Item>>;

    /// Apply a partial edit to an existing item; absent fields keep their
    /// stored values. A missing id is an idempotent no-op.
    fn update_item(&self, id: i64, update: ItemUpdate) -> Result<()>;

    /// Assign a category to an item. A missing id is an idempotent no-op.
    fn set_item_category(&self, id: i64, category_id: i64) -> Result<()>;

    /// Delete every item belonging to a payment.
    /// Returns the number of items deleted.
    fn delete_items_for_payment(&self, payment_id: i64) -> Result<u32>;
}

/// Trait defining the interface for storage connections.
///
/// A connection owns the shared state of one data directory and hands out
/// repositories over it. Repositories created from clones of the same
/// connection observe the same collections.
pub trait Connection: Send + Sync + Clone {
    type Categories: CategoryStorage + Clone;
    type Payments: PaymentStorage + Clone;
    type Items: ItemStorage + Clone;

    fn category_repository(&self) -> Self::Categories;
    fn payment_repository(&self) -> Self::Payments;
    fn item_repository(&self) -> Self::Items;
}
