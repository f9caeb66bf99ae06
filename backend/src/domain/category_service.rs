//! Category management service: CRUD plus the default seed list.

use anyhow::Result;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use shared::CategoryUpsertRequest;

use crate::domain::models::{Category, CategoryUpdate, NewCategory};
use crate::domain::DomainError;
use crate::storage::{CategoryStorage, Connection};

/// The fixed grocery-and-household seed, applied once to an empty store.
/// Limits are in minor units; 0 means no limit.
const DEFAULT_CATEGORIES: [(&str, &str, &str, i64); 10] = [
    ("Бакалея", "Крупы, макароны, рис, гречка, нут, долгие углеводы", "#6b7280", 0),
    ("Белок", "Мясо, птица, рыба, морепродукты, яйца", "#3b82f6", 0),
    ("Бытовая химия", "Средства для уборки, тряпки, салфетки и так далее", "#ef4444", 0),
    ("Джанг-фуд", "Чипсы, мармелад, сладости, снеки. Всё вредное и вкусное", "#8b5cf6", 4000),
    (
        "Молочная продукция",
        "Молоко (альтернативное и коровье), сливочное масло, сливки, творог и так далее",
        "#3b82f6",
        0,
    ),
    ("Овощи, фрукты", "Замороженные, консервированные, свежие", "#10b981", 0),
    ("Прочее", "Все остальные траты", "#6b7280", 100),
    ("Развлечения", "Кино, рестораны, кафе, досуг", "#8b5cf6", 0),
    ("Сервис", "Оплата за доставку, пакеты и так далее", "#3b82f6", 0),
    ("Чай, кофе", "Кофе, чай, травяные напитки", "#22c55e", 0),
];

static COLOR_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid regex"));

#[derive(Clone)]
pub struct CategoryService<C: Connection> {
    categories: C::Categories,
}

impl<C: Connection> CategoryService<C> {
    pub fn new(connection: &C) -> Self {
        Self {
            categories: connection.category_repository(),
        }
    }

    /// Populate the default categories when the collection is empty.
    /// Returns the number of categories inserted (0 when already seeded).
    pub fn seed_defaults(&self) -> Result<usize> {
        if !self.categories.list_categories()?.is_empty() {
            return Ok(0);
        }
        info!("Category collection is empty, seeding defaults");
        for (name, description, color, monthly_limit) in DEFAULT_CATEGORIES {
            self.categories.store_category(NewCategory {
                name: name.to_string(),
                description: description.to_string(),
                color: color.to_string(),
                monthly_limit,
            })?;
        }
        Ok(DEFAULT_CATEGORIES.len())
    }

    pub fn list(&self) -> Result<Vec<Category>> {
        self.categories.list_categories()
    }

    /// Create a category, or update one in place when the request carries an
    /// id. An update of a missing id is an idempotent no-op, per the store's
    /// mutation semantics. Returns the category id.
    pub fn upsert(&self, request: CategoryUpsertRequest) -> Result<i64, DomainError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Название категории не может быть пустым"));
        }
        if !COLOR_FORMAT.is_match(&request.color) {
            return Err(DomainError::validation("Цвет должен быть в формате #rrggbb"));
        }
        if request.monthly_limit < 0 {
            return Err(DomainError::validation("Лимит не может быть отрицательным"));
        }

        let description = request.description.unwrap_or_default();
        match request.id {
            Some(id) => {
                self.categories.update_category(
                    id,
                    CategoryUpdate {
                        name,
                        description,
                        color: request.color,
                        monthly_limit: request.monthly_limit,
                    },
                )?;
                Ok(id)
            }
            None => {
                let created = self.categories.store_category(NewCategory {
                    name,
                    description,
                    color: request.color,
                    monthly_limit: request.monthly_limit,
                })?;
                Ok(created.id)
            }
        }
    }

    /// Delete a category. Items keep their dangling reference; read sites
    /// resolve it to "no category".
    pub fn delete(&self, id: i64) -> Result<()> {
        self.categories.delete_category(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::json::test_utils::TestEnvironment;

    fn service(env: &TestEnvironment) -> CategoryService<crate::storage::json::JsonConnection> {
        CategoryService::new(&env.connection)
    }

    fn upsert_request(name: &str) -> CategoryUpsertRequest {
        CategoryUpsertRequest {
            id: None,
            name: name.to_string(),
            description: None,
            color: "#10b981".to_string(),
            monthly_limit: 0,
        }
    }

    #[test]
    fn seeds_the_default_list_exactly_once() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);

        assert_eq!(service.seed_defaults().unwrap(), 10);
        assert_eq!(service.seed_defaults().unwrap(), 0);

        let categories = service.list().unwrap();
        assert_eq!(categories.len(), 10);

        let misc = categories.iter().find(|c| c.name == "Прочее").unwrap();
        assert_eq!(misc.monthly_limit, 100);
        let junk = categories.iter().find(|c| c.name == "Джанг-фуд").unwrap();
        assert_eq!(junk.monthly_limit, 4000);
    }

    #[test]
    fn does_not_seed_a_non_empty_collection() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);
        service.upsert(upsert_request("Своя категория")).unwrap();

        assert_eq!(service.seed_defaults().unwrap(), 0);
        assert_eq!(service.list().unwrap().len(), 1);
    }

    #[test]
    fn upsert_with_id_edits_in_place() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);
        let id = service.upsert(upsert_request("Чай")).unwrap();

        let edited = service
            .upsert(CategoryUpsertRequest {
                id: Some(id),
                name: "Чай, кофе".to_string(),
                description: Some("Кофе, чай, травяные напитки".to_string()),
                color: "#22c55e".to_string(),
                monthly_limit: 500,
            })
            .unwrap();
        assert_eq!(edited, id);

        let categories = service.list().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Чай, кофе");
        assert_eq!(categories[0].monthly_limit, 500);
    }

    #[test]
    fn rejects_bad_color_and_empty_name() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);

        let mut bad_color = upsert_request("Сервис");
        bad_color.color = "green".to_string();
        assert!(matches!(
            service.upsert(bad_color),
            Err(DomainError::Validation(_))
        ));

        assert!(matches!(
            service.upsert(upsert_request("   ")),
            Err(DomainError::Validation(_))
        ));

        let mut negative = upsert_request("Сервис");
        negative.monthly_limit = -1;
        assert!(matches!(
            service.upsert(negative),
            Err(DomainError::Validation(_))
        ));
    }
}
