//! JSON-file-backed category repository.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::domain::models::{Category, CategoryUpdate, NewCategory};
use crate::storage::CategoryStorage;

use super::connection::{JsonConnection, CATEGORIES_FILE};

#[derive(Clone)]
pub struct CategoryRepository {
    connection: JsonConnection,
}

impl CategoryRepository {
    pub fn new(connection: JsonConnection) -> Self {
        Self { connection }
    }
}

impl CategoryStorage for CategoryRepository {
    fn store_category(&self, new: NewCategory) -> Result<Category> {
        let mut table = JsonConnection::lock(&self.connection.categories);
        let category = Category {
            id: table.allocate_id(),
            name: new.name,
            description: new.description,
            color: new.color,
            monthly_limit: new.monthly_limit,
            created_at: Utc::now(),
        };
        table.records.push(category.clone());
        self.connection.save_array(CATEGORIES_FILE, &table.records);
        info!("Stored category {} ({})", category.id, category.name);
        Ok(category)
    }

    fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let table = JsonConnection::lock(&self.connection.categories);
        Ok(table.records.iter().find(|c| c.id == id).cloned())
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let table = JsonConnection::lock(&self.connection.categories);
        let mut categories = table.records.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    fn update_category(&self, id: i64, update: CategoryUpdate) -> Result<()> {
        let mut table = JsonConnection::lock(&self.connection.categories);
        match table.records.iter_mut().find(|c| c.id == id) {
            Some(category) => {
                category.name = update.name;
                category.description = update.description;
                category.color = update.color;
                category.monthly_limit = update.monthly_limit;
            }
            // Editing a missing id is an idempotent no-op.
            None => {
                info!("update_category: no category with id {}, nothing to do", id);
                return Ok(());
            }
        }
        self.connection.save_array(CATEGORIES_FILE, &table.records);
        Ok(())
    }

    fn delete_category(&self, id: i64) -> Result<()> {
        let mut table = JsonConnection::lock(&self.connection.categories);
        let before = table.records.len();
        table.records.retain(|c| c.id != id);
        if table.records.len() < before {
            self.connection.save_array(CATEGORIES_FILE, &table.records);
            info!("Deleted category {}", id);
        }
        Ok(())
    }
}
