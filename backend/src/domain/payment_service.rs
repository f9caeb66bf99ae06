//! Payment management service: manual creation, listing with items joined,
//! edits and cascading deletion.

use anyhow::Result;
use log::info;
use shared::{
    AddItemRequest, CreatePaymentRequest, ItemView, Participant, PaymentWithItems,
    UpdateItemRequest, UpdatePaymentRequest,
};

use crate::domain::models::{Category, Item, ItemUpdate, NewItem, NewPayment, PaymentTotalsUpdate};
use crate::domain::DomainError;
use crate::storage::{CategoryStorage, Connection, ItemStorage, PaymentStorage};

#[derive(Clone)]
pub struct PaymentService<C: Connection> {
    payments: C::Payments,
    items: C::Items,
    categories: C::Categories,
}

impl<C: Connection> PaymentService<C> {
    pub fn new(connection: &C) -> Self {
        Self {
            payments: connection.payment_repository(),
            items: connection.item_repository(),
            categories: connection.category_repository(),
        }
    }

    /// Manual payment creation. Unlike QR ingestion, this path enforces the
    /// 50/50 bookkeeping invariant: the per-participant amounts must add up
    /// to the total. Inline items are persisted as children.
    pub fn create_manual(
        &self,
        request: CreatePaymentRequest,
        created_by: Participant,
    ) -> Result<i64, DomainError> {
        if request.total <= 0 {
            return Err(DomainError::validation("Сумма платежа должна быть положительной"));
        }
        if request.paid_egor < 0 || request.paid_syoma < 0 {
            return Err(DomainError::validation("Суммы оплат не могут быть отрицательными"));
        }
        if request.paid_egor + request.paid_syoma != request.total {
            return Err(DomainError::validation(
                "Сумма платежей не соответствует общей сумме",
            ));
        }
        if let Some(items) = &request.items {
            if items.iter().any(|i| i.qty <= 0.0 || i.price <= 0) {
                return Err(DomainError::validation(
                    "Количество и цена товара должны быть положительными",
                ));
            }
        }

        let payment = self.payments.store_payment(NewPayment {
            total: request.total,
            paid_egor: request.paid_egor,
            paid_syoma: request.paid_syoma,
            description: request.description,
            raw_qr: None,
            fns_payload: None,
            created_by,
        })?;

        for item in request.items.unwrap_or_default() {
            self.items.store_item(NewItem {
                payment_id: payment.id,
                name: item.name,
                qty: item.qty,
                price: item.price,
                category_id: item.category_id,
            })?;
        }

        Ok(payment.id)
    }

    /// All payments, most recent first, with items joined and each item's
    /// category resolved. A dangling category reference resolves to "no
    /// category".
    pub fn list_with_items(&self) -> Result<Vec<PaymentWithItems>> {
        let categories = self.categories.list_categories()?;
        let payments = self.payments.list_payments()?;

        payments
            .into_iter()
            .map(|payment| {
                let items = self
                    .items
                    .list_items_for_payment(payment.id)?
                    .into_iter()
                    .map(|item| item_view(item, &categories))
                    .collect();
                Ok(PaymentWithItems {
                    id: payment.id,
                    ts: payment.ts,
                    total: payment.total,
                    paid_egor: payment.paid_egor,
                    paid_syoma: payment.paid_syoma,
                    description: payment.description,
                    raw_qr: payment.raw_qr,
                    fns_payload: payment.fns_payload,
                    created_by: payment.created_by,
                    items,
                })
            })
            .collect()
    }

    /// Replace a payment's totals and description. A missing id is an
    /// idempotent no-op.
    pub fn update_totals(&self, id: i64, request: UpdatePaymentRequest) -> Result<()> {
        self.payments.update_payment_totals(
            id,
            PaymentTotalsUpdate {
                total: request.total,
                paid_egor: request.paid_egor,
                paid_syoma: request.paid_syoma,
                description: request.description,
            },
        )
    }

    /// Delete a payment and cascade to every item it owns. Deleting a
    /// missing id is an idempotent no-op.
    pub fn delete(&self, id: i64) -> Result<()> {
        if self.payments.delete_payment(id)? {
            let removed = self.items.delete_items_for_payment(id)?;
            info!("Deleted payment {} and {} items", id, removed);
        } else {
            info!("delete: no payment with id {}, nothing to do", id);
        }
        Ok(())
    }

    /// Partial item edit; absent fields keep their stored values. A missing
    /// id is an idempotent no-op.
    pub fn update_item(&self, id: i64, request: UpdateItemRequest) -> Result<()> {
        self.items.update_item(
            id,
            ItemUpdate {
                name: request.name,
                qty: request.qty,
                price: request.price,
                category_id: request.category_id,
            },
        )
    }

    /// Ad-hoc item added to an existing payment. The request price arrives
    /// in major units and converts to minor units here.
    pub fn add_item(&self, payment_id: i64, request: AddItemRequest) -> Result<i64, DomainError> {
        if request.name.trim().is_empty() || request.qty <= 0.0 || request.price <= 0.0 {
            return Err(DomainError::validation(
                "Название, количество и цена обязательны",
            ));
        }
        let item = self.items.store_item(NewItem {
            payment_id,
            name: request.name,
            qty: request.qty,
            price: (request.price * 100.0).round() as i64,
            category_id: None,
        })?;
        Ok(item.id)
    }
}

fn item_view(item: Item, categories: &[Category]) -> ItemView {
    let category = item
        .category_id
        .and_then(|id| categories.iter().find(|c| c.id == id));
    ItemView {
        id: item.id,
        name: item.name,
        qty: item.qty,
        price: item.price,
        category_id: item.category_id,
        category_name: category.map(|c| c.name.clone()),
        category_color: category.map(|c| c.color.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::json::test_utils::TestEnvironment;
    use crate::storage::json::JsonConnection;
    use shared::{CategoryUpsertRequest, NewItemPayload};

    fn service(env: &TestEnvironment) -> PaymentService<JsonConnection> {
        PaymentService::new(&env.connection)
    }

    fn create_request(total: i64, paid_egor: i64, paid_syoma: i64) -> CreatePaymentRequest {
        CreatePaymentRequest {
            total,
            paid_egor,
            paid_syoma,
            description: None,
            items: None,
        }
    }

    #[test]
    fn manual_creation_enforces_the_split_invariant() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);

        assert!(matches!(
            service.create_manual(create_request(1000, 300, 300), Participant::Egor),
            Err(DomainError::Validation(_))
        ));
        assert!(service
            .create_manual(create_request(1000, 600, 400), Participant::Egor)
            .is_ok());
    }

    #[test]
    fn rejects_non_positive_totals() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);
        assert!(matches!(
            service.create_manual(create_request(0, 0, 0), Participant::Syoma),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn inline_items_are_persisted_with_the_payment() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);

        let id = service
            .create_manual(
                CreatePaymentRequest {
                    total: 15_000,
                    paid_egor: 15_000,
                    paid_syoma: 0,
                    description: Some("Продукты".to_string()),
                    items: Some(vec![
                        NewItemPayload {
                            name: "Молоко".to_string(),
                            qty: 2.0,
                            price: 9_000,
                            category_id: None,
                        },
                        NewItemPayload {
                            name: "Хлеб".to_string(),
                            qty: 1.0,
                            price: 6_000,
                            category_id: None,
                        },
                    ]),
                },
                Participant::Egor,
            )
            .unwrap();

        let listed = service.list_with_items().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].items.len(), 2);
    }

    #[test]
    fn deleting_a_payment_cascades_to_its_items_only() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);

        let doomed = service
            .create_manual(create_request(1000, 1000, 0), Participant::Egor)
            .unwrap();
        service
            .add_item(doomed, AddItemRequest { name: "Кофе".to_string(), qty: 1.0, price: 10.0 })
            .unwrap();

        let kept = service
            .create_manual(create_request(500, 0, 500), Participant::Syoma)
            .unwrap();
        service
            .add_item(kept, AddItemRequest { name: "Чай".to_string(), qty: 1.0, price: 5.0 })
            .unwrap();

        service.delete(doomed).unwrap();

        let listed = service.list_with_items().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept);
        assert_eq!(listed[0].items.len(), 1);

        // Deleting again stays a no-op.
        service.delete(doomed).unwrap();
        assert_eq!(service.list_with_items().unwrap().len(), 1);
    }

    #[test]
    fn add_item_converts_major_units() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);
        let payment = service
            .create_manual(create_request(1000, 1000, 0), Participant::Egor)
            .unwrap();

        service
            .add_item(
                payment,
                AddItemRequest { name: "Сыр".to_string(), qty: 1.0, price: 359.9 },
            )
            .unwrap();

        let listed = service.list_with_items().unwrap();
        assert_eq!(listed[0].items[0].price, 35_990);
    }

    #[test]
    fn dangling_category_resolves_to_none() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);
        let categories = crate::domain::CategoryService::new(&env.connection);

        let category_id = categories
            .upsert(CategoryUpsertRequest {
                id: None,
                name: "Белок".to_string(),
                description: None,
                color: "#3b82f6".to_string(),
                monthly_limit: 0,
            })
            .unwrap();

        let payment = service
            .create_manual(
                CreatePaymentRequest {
                    total: 1000,
                    paid_egor: 1000,
                    paid_syoma: 0,
                    description: None,
                    items: Some(vec![NewItemPayload {
                        name: "Курица".to_string(),
                        qty: 1.0,
                        price: 1000,
                        category_id: Some(category_id),
                    }]),
                },
                Participant::Egor,
            )
            .unwrap();

        let listed = service.list_with_items().unwrap();
        assert_eq!(listed[0].items[0].category_name.as_deref(), Some("Белок"));

        categories.delete(category_id).unwrap();

        let listed = service.list_with_items().unwrap();
        let item = &listed[0].items[0];
        // The reference dangles; the read site resolves it to no category.
        assert_eq!(item.category_id, Some(category_id));
        assert!(item.category_name.is_none());
        assert!(item.category_color.is_none());
        assert_eq!(listed[0].id, payment);
    }

    #[test]
    fn update_of_missing_payment_is_a_no_op() {
        let env = TestEnvironment::new().unwrap();
        let service = service(&env);
        service
            .update_totals(
                404,
                UpdatePaymentRequest {
                    total: 100,
                    paid_egor: 100,
                    paid_syoma: 0,
                    description: None,
                },
            )
            .unwrap();
        assert!(service.list_with_items().unwrap().is_empty());
    }
}
