//! JSON-file-backed item repository.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::domain::models::{Item, ItemUpdate, NewItem};
use crate::storage::ItemStorage;

use super::connection::{JsonConnection, ITEMS_FILE};

#[derive(Clone)]
pub struct ItemRepository {
    connection: JsonConnection,
}

impl ItemRepository {
    pub fn new(connection: JsonConnection) -> Self {
        Self { connection }
    }
}

impl ItemStorage for ItemRepository {
    fn store_item(&self, new: NewItem) -> Result<Item> {
        let mut table = JsonConnection::lock(&self.connection.items);
        let item = Item {
            id: table.allocate_id(),
            payment_id: new.payment_id,
            name: new.name,
            qty: new.qty,
            price: new.price,
            category_id: new.category_id,
            created_at: Utc::now(),
        };
        table.records.push(item.clone());
        self.connection.save_array(ITEMS_FILE, &table.records);
        Ok(item)
    }

    fn list_items_for_payment(&self, payment_id: i64) -> Result<Vec<Item>> {
        let table = JsonConnection::lock(&self.connection.items);
        Ok(table
            .records
            .iter()
            .filter(|i| i.payment_id == payment_id)
            .cloned()
            .collect())
    }

    fn list_uncategorized_for_payment(&self, payment_id: i64) -> Result<Vec<Item>> {
        let table = JsonConnection::lock(&self.connection.items);
        Ok(table
            .records
            .iter()
            .filter(|i| i.payment_id == payment_id && i.category_id.is_none())
            .cloned()
            .collect())
    }

    fn update_item(&self, id: i64, update: ItemUpdate) -> Result<()> {
        let mut table = JsonConnection::lock(&self.connection.items);
        match table.records.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                if let Some(name) = update.name {
                    item.name = name;
                }
                if let Some(qty) = update.qty {
                    item.qty = qty;
                }
                if let Some(price) = update.price {
                    item.price = price;
                }
                if let Some(category_id) = update.category_id {
                    item.category_id = Some(category_id);
                }
            }
            // Editing a missing id is an idempotent no-op.
            None => {
                info!("update_item: no item with id {}, nothing to do", id);
                return Ok(());
            }
        }
        self.connection.save_array(ITEMS_FILE, &table.records);
        Ok(())
    }

    fn set_item_category(&self, id: i64, category_id: i64) -> Result<()> {
        self.update_item(
            id,
            ItemUpdate {
                category_id: Some(category_id),
                ..ItemUpdate::default()
            },
        )
    }

    fn delete_items_for_payment(&self, payment_id: i64) -> Result<u32> {
        let mut table = JsonConnection::lock(&self.connection.items);
        let before = table.records.len();
        table.records.retain(|i| i.payment_id != payment_id);
        let deleted = (before - table.records.len()) as u32;
        if deleted > 0 {
            self.connection.save_array(ITEMS_FILE, &table.records);
            info!("Deleted {} items of payment {}", deleted, payment_id);
        }
        Ok(deleted)
    }
}
