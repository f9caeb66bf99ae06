//! Connection over one JSON data directory.

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::models::{Category, Item, Payment};

use super::category_repository::CategoryRepository;
use super::item_repository::ItemRepository;
use super::payment_repository::PaymentRepository;
use crate::storage::Connection;

pub(crate) const CATEGORIES_FILE: &str = "categories.json";
pub(crate) const PAYMENTS_FILE: &str = "payments.json";
pub(crate) const ITEMS_FILE: &str = "items.json";

/// Record types that carry a store-assigned integer id.
pub(crate) trait HasId {
    fn record_id(&self) -> i64;
}

impl HasId for Category {
    fn record_id(&self) -> i64 {
        self.id
    }
}

impl HasId for Payment {
    fn record_id(&self) -> i64 {
        self.id
    }
}

impl HasId for Item {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// In-memory collection of one entity type plus its id counter.
///
/// The counter is seeded from `max(existing id) + 1` so ids stay unique
/// across process restarts even after deletions.
pub(crate) struct Table<T> {
    pub records: Vec<T>,
    next_id: i64,
}

impl<T: HasId> Table<T> {
    fn load(records: Vec<T>) -> Self {
        let next_id = records
            .iter()
            .map(HasId::record_id)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1);
        Self { records, next_id }
    }

    pub fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Shared state over one data directory: three collections, each mirrored
/// to a pretty-printed JSON array file.
///
/// Clones share the underlying collections, so repositories handed out by
/// any clone observe the same data. Each collection sits behind its own
/// mutex; writers to the same entity type are serialized, writers to
/// different entity types are not (there is no cross-entity transaction —
/// a crash between the payment write and the item write of one ingestion
/// leaves an orphaned payment, which is accepted and documented behavior).
#[derive(Clone)]
pub struct JsonConnection {
    data_dir: PathBuf,
    pub(crate) categories: Arc<Mutex<Table<Category>>>,
    pub(crate) payments: Arc<Mutex<Table<Payment>>>,
    pub(crate) items: Arc<Mutex<Table<Item>>>,
}

impl JsonConnection {
    /// Open a data directory, creating it if needed, and load all three
    /// collections. A missing file means an empty collection; a corrupt
    /// file is logged and treated as empty. Startup never fails on data
    /// content, only on an unusable directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let categories: Vec<Category> = load_array(&data_dir.join(CATEGORIES_FILE));
        let payments: Vec<Payment> = load_array(&data_dir.join(PAYMENTS_FILE));
        let items: Vec<Item> = load_array(&data_dir.join(ITEMS_FILE));

        info!(
            "Loaded {} categories, {} payments, {} items from {}",
            categories.len(),
            payments.len(),
            items.len(),
            data_dir.display()
        );

        Ok(Self {
            data_dir,
            categories: Arc::new(Mutex::new(Table::load(categories))),
            payments: Arc::new(Mutex::new(Table::load(payments))),
            items: Arc::new(Mutex::new(Table::load(items))),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Rewrite one entity file from the in-memory collection.
    ///
    /// Write errors are logged and swallowed: the in-memory state stays
    /// authoritative and disk catches up on the next successful write. The
    /// store offers no durability guarantee to begin with.
    pub(crate) fn save_array<T: Serialize>(&self, file: &str, records: &[T]) {
        let path = self.data_dir.join(file);
        let json = match serde_json::to_string_pretty(records) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {}: {}", file, e);
                return;
            }
        };
        if let Err(e) = fs::write(&path, json) {
            error!("Failed to write {}: {}", path.display(), e);
        }
    }

    /// Lock a table, recovering the data if a previous holder panicked.
    pub(crate) fn lock<T>(table: &Mutex<Table<T>>) -> MutexGuard<'_, Table<T>> {
        table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Connection for JsonConnection {
    type Categories = CategoryRepository;
    type Payments = PaymentRepository;
    type Items = ItemRepository;

    fn category_repository(&self) -> CategoryRepository {
        CategoryRepository::new(self.clone())
    }

    fn payment_repository(&self) -> PaymentRepository {
        PaymentRepository::new(self.clone())
    }

    fn item_repository(&self) -> ItemRepository {
        ItemRepository::new(self.clone())
    }
}

fn load_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|content| {
        serde_json::from_str::<Vec<T>>(&content).map_err(anyhow::Error::from)
    }) {
        Ok(records) => records,
        Err(e) => {
            warn!(
                "Failed to read {}: {}; starting with an empty collection",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NewCategory;
    use crate::storage::{CategoryStorage, PaymentStorage};

    fn sample_category() -> NewCategory {
        NewCategory {
            name: "Овощи, фрукты".to_string(),
            description: "Свежие и замороженные".to_string(),
            color: "#10b981".to_string(),
            monthly_limit: 0,
        }
    }

    #[test]
    fn missing_files_mean_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let conn = JsonConnection::new(dir.path()).unwrap();
        assert!(conn.category_repository().list_categories().unwrap().is_empty());
        assert!(conn.payment_repository().list_payments().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CATEGORIES_FILE), "{ not json ]").unwrap();
        let conn = JsonConnection::new(dir.path()).unwrap();
        assert!(conn.category_repository().list_categories().unwrap().is_empty());
    }

    #[test]
    fn non_array_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CATEGORIES_FILE), r#"{"id": 1}"#).unwrap();
        let conn = JsonConnection::new(dir.path()).unwrap();
        assert!(conn.category_repository().list_categories().unwrap().is_empty());
    }

    #[test]
    fn data_survives_reload_and_counter_reseeds() {
        let dir = tempfile::tempdir().unwrap();
        {
            let conn = JsonConnection::new(dir.path()).unwrap();
            let repo = conn.category_repository();
            let first = repo.store_category(sample_category()).unwrap();
            assert_eq!(first.id, 1);
            repo.delete_category(first.id).unwrap();
            let second = repo.store_category(sample_category()).unwrap();
            assert_eq!(second.id, 2);
        }
        // New process: the counter must continue past every id ever issued
        // that is still on disk.
        let conn = JsonConnection::new(dir.path()).unwrap();
        let repo = conn.category_repository();
        let third = repo.store_category(sample_category()).unwrap();
        assert_eq!(third.id, 3);
    }

    #[test]
    fn clones_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let conn = JsonConnection::new(dir.path()).unwrap();
        let repo_a = conn.category_repository();
        let repo_b = conn.clone().category_repository();
        repo_a.store_category(sample_category()).unwrap();
        assert_eq!(repo_b.list_categories().unwrap().len(), 1);
    }
}
