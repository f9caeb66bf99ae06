//! Receipt ingestion workflow.
//!
//! Orchestrates decode → parse → dedupe → persist payment → fetch items →
//! persist items → classify, with each stage committed before the next one
//! runs. The dedupe check is the only true abort: it happens before any
//! record exists. Every later stage degrades instead of failing — a lookup
//! or classification error leaves the already-committed payment in place.

use anyhow::Result;
use log::{error, info};
use shared::Participant;
use thiserror::Error;

use crate::ai::{AiClassifier, CategoryOption, ItemToClassify};
use crate::domain::classification;
use crate::fiscal::FiscalClient;
use crate::qr::ReceiptPayload;
use crate::storage::{CategoryStorage, Connection, ItemStorage, PaymentStorage};
use crate::domain::models::{NewItem, NewPayment};

#[derive(Debug, Error)]
pub enum IngestError {
    /// A payment with an identical raw QR string already exists.
    /// Resubmitting the same receipt is safe and creates nothing.
    #[error("Платеж с таким QR кодом уже создан")]
    Duplicate,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Terminal report of a successful ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub payment_id: i64,
    /// Human-readable summary; reminds the user the split still needs a
    /// manual edit.
    pub message: String,
    pub items_imported: usize,
    pub classified: usize,
}

/// Outcome of one classification pass over a payment's items.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOutcome {
    /// Items that were sent for classification.
    pub requested: usize,
    /// Items that actually received a category.
    pub updated: usize,
}

#[derive(Clone)]
pub struct IngestService<C: Connection> {
    payments: C::Payments,
    items: C::Items,
    categories: C::Categories,
    fiscal: FiscalClient,
    classifier: AiClassifier,
}

impl<C: Connection> IngestService<C> {
    pub fn new(connection: &C, fiscal: FiscalClient, classifier: AiClassifier) -> Self {
        Self {
            payments: connection.payment_repository(),
            items: connection.item_repository(),
            categories: connection.category_repository(),
            fiscal,
            classifier,
        }
    }

    /// Run the full ingestion workflow over a raw QR string. The scanning
    /// participant gets 100% of the total attributed to them; the report
    /// tells the user to correct the split afterwards.
    pub async fn ingest_qr(
        &self,
        raw_qr: &str,
        scanner: Participant,
    ) -> Result<IngestReport, IngestError> {
        let payload = ReceiptPayload::parse(raw_qr);
        info!("Parsed receipt payload: {:?}", payload);

        // The one rollback point: nothing has been written yet.
        if self.payments.find_payment_by_raw_qr(raw_qr)?.is_some() {
            info!("Payment with this QR string already exists");
            return Err(IngestError::Duplicate);
        }

        let total = payload.total_minor_units().unwrap_or(0);
        let description = match payload.sum {
            Some(sum) => format!(
                "Чек от {} на {}₽",
                payload.date.as_deref().unwrap_or("неизвестной даты"),
                sum
            ),
            None => "Чек из QR кода (требует редактирования сумм)".to_string(),
        };
        let (paid_egor, paid_syoma) = match scanner {
            Participant::Egor => (total, 0),
            Participant::Syoma => (0, total),
        };

        let payment = self.payments.store_payment(NewPayment {
            total,
            paid_egor,
            paid_syoma,
            description: Some(description),
            raw_qr: Some(raw_qr.to_string()),
            fns_payload: serde_json::to_string(&payload).ok(),
            created_by: scanner,
        })?;
        info!("Created payment {} from QR scan by {}", payment.id, scanner);

        let mut items_imported = 0;
        let mut classified = 0;
        if payload.has_fiscal_fields() {
            if let Some(lines) = self.fiscal.fetch_items(&payload).await {
                for line in &lines {
                    self.items.store_item(NewItem {
                        payment_id: payment.id,
                        name: line.name.clone(),
                        qty: line.quantity,
                        price: line.sum,
                        category_id: None,
                    })?;
                }
                items_imported = lines.len();
                info!("Imported {} receipt items for payment {}", items_imported, payment.id);

                if items_imported > 0 {
                    classified = match self.classify_payment(payment.id, false).await {
                        Ok(outcome) => outcome.updated,
                        Err(e) => {
                            error!("Auto-classification failed: {:?}", e);
                            0
                        }
                    };
                }
            } else {
                info!("No items available from the receipt lookup, payment stays itemless");
            }
        } else {
            info!("Receipt payload incomplete, skipping the item lookup");
        }

        let message = if total > 0 {
            format!(
                "Чек на {:.2}₽ сохранен. Отредактируйте кто сколько заплатил.",
                total as f64 / 100.0
            )
        } else {
            "QR код сохранен. Отредактируйте платеж с правильными суммами.".to_string()
        };

        Ok(IngestReport {
            payment_id: payment.id,
            message,
            items_imported,
            classified,
        })
    }

    /// Classify a payment's items — all of them, or only the ones without a
    /// category. Used by the ingestion workflow and by the on-demand
    /// endpoints. A failed or empty classification updates nothing.
    pub async fn classify_payment(
        &self,
        payment_id: i64,
        only_uncategorized: bool,
    ) -> Result<ClassifyOutcome> {
        let items = if only_uncategorized {
            self.items.list_uncategorized_for_payment(payment_id)?
        } else {
            self.items.list_items_for_payment(payment_id)?
        };
        if items.is_empty() {
            return Ok(ClassifyOutcome { requested: 0, updated: 0 });
        }

        let categories = self.categories.list_categories()?;
        if categories.is_empty() {
            info!("No categories available, skipping classification");
            return Ok(ClassifyOutcome { requested: items.len(), updated: 0 });
        }

        let to_classify: Vec<ItemToClassify> = items
            .iter()
            .map(|item| ItemToClassify {
                id: item.id,
                name: item.name.clone(),
                qty: item.qty,
                price: item.price,
            })
            .collect();
        let options: Vec<CategoryOption> = categories
            .iter()
            .map(|category| CategoryOption {
                id: category.id,
                name: category.name.clone(),
                description: category.description.clone(),
            })
            .collect();

        let raw = self.classifier.classify(&to_classify, &options).await;
        let resolved = classification::resolve_mapping(&to_classify, &categories, &raw);

        let mut updated = 0;
        for (item_id, category_id) in resolved {
            self.items.set_item_category(item_id, category_id)?;
            updated += 1;
        }
        info!("Classification updated {} of {} items", updated, items.len());
        Ok(ClassifyOutcome { requested: items.len(), updated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ClassifierConfig;
    use crate::fiscal::FiscalConfig;
    use crate::storage::json::test_utils::TestEnvironment;
    use crate::storage::json::JsonConnection;
    use crate::storage::ItemStorage;

    // Clients without credentials short-circuit before any network call,
    // which keeps these tests offline: the lookup yields no items and the
    // classifier yields an empty mapping.
    fn offline_service(env: &TestEnvironment) -> IngestService<JsonConnection> {
        IngestService::new(
            &env.connection,
            FiscalClient::new(FiscalConfig {
                token: None,
                base_url: "http://127.0.0.1:1".to_string(),
                timeout_secs: 1,
            }),
            AiClassifier::new(ClassifierConfig {
                api_key: None,
                model: "claude-3-haiku-20240307".to_string(),
                timeout_secs: 1,
            }),
        )
    }

    const FULL_QR: &str = "t=20250630T1736&s=1234.56&fn=9960440300000001&i=12345&fp=987654321&n=1";

    #[tokio::test]
    async fn creates_a_payment_attributed_to_the_scanner() {
        let env = TestEnvironment::new().unwrap();
        let service = offline_service(&env);

        let report = service.ingest_qr(FULL_QR, Participant::Syoma).await.unwrap();
        assert_eq!(report.items_imported, 0);
        assert!(report.message.contains("1234.56₽"));

        let payment = env
            .connection
            .payment_repository()
            .get_payment(report.payment_id)
            .unwrap()
            .unwrap();
        assert_eq!(payment.total, 123_456);
        assert_eq!(payment.paid_egor, 0);
        assert_eq!(payment.paid_syoma, 123_456);
        assert_eq!(payment.raw_qr.as_deref(), Some(FULL_QR));
        assert_eq!(
            payment.description.as_deref(),
            Some("Чек от 30.06.2025 17:36 на 1234.56₽")
        );
        assert!(payment.fns_payload.is_some());
    }

    #[tokio::test]
    async fn resubmitting_the_same_qr_creates_exactly_one_payment() {
        let env = TestEnvironment::new().unwrap();
        let service = offline_service(&env);

        service.ingest_qr(FULL_QR, Participant::Egor).await.unwrap();
        let second = service.ingest_qr(FULL_QR, Participant::Egor).await;
        assert!(matches!(second, Err(IngestError::Duplicate)));

        assert_eq!(
            env.connection.payment_repository().list_payments().unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn partial_payload_still_creates_a_payment() {
        let env = TestEnvironment::new().unwrap();
        let service = offline_service(&env);

        // No fn/i/fp fields: best-effort total, no item lookup.
        let report = service
            .ingest_qr("t=20250630T1736&s=500.00", Participant::Egor)
            .await
            .unwrap();
        assert_eq!(report.items_imported, 0);

        let payment = env
            .connection
            .payment_repository()
            .get_payment(report.payment_id)
            .unwrap()
            .unwrap();
        assert_eq!(payment.total, 50_000);
        assert_eq!(payment.paid_egor, 50_000);
    }

    #[tokio::test]
    async fn unparsable_payload_records_a_placeholder_payment() {
        let env = TestEnvironment::new().unwrap();
        let service = offline_service(&env);

        let report = service.ingest_qr("garbage-qr-string", Participant::Egor).await.unwrap();
        assert!(report.message.contains("Отредактируйте платеж"));

        let payment = env
            .connection
            .payment_repository()
            .get_payment(report.payment_id)
            .unwrap()
            .unwrap();
        assert_eq!(payment.total, 0);
        assert_eq!(
            payment.description.as_deref(),
            Some("Чек из QR кода (требует редактирования сумм)")
        );
    }

    #[tokio::test]
    async fn classify_payment_reports_nothing_to_do() {
        let env = TestEnvironment::new().unwrap();
        let service = offline_service(&env);

        let outcome = service.classify_payment(1, false).await.unwrap();
        assert_eq!(outcome.requested, 0);
        assert_eq!(outcome.updated, 0);
    }

    #[tokio::test]
    async fn failed_classification_leaves_items_uncategorized() {
        let env = TestEnvironment::new().unwrap();
        let service = offline_service(&env);
        let items = env.connection.item_repository();
        items
            .store_item(crate::domain::models::NewItem {
                payment_id: 1,
                name: "Банан".to_string(),
                qty: 1.0,
                price: 100,
                category_id: None,
            })
            .unwrap();
        crate::domain::CategoryService::new(&env.connection)
            .seed_defaults()
            .unwrap();

        // The classifier has no credentials, so the mapping comes back
        // empty and nothing changes.
        let outcome = service.classify_payment(1, true).await.unwrap();
        assert_eq!(outcome.requested, 1);
        assert_eq!(outcome.updated, 0);
        assert!(items.list_items_for_payment(1).unwrap()[0].category_id.is_none());
    }
}
