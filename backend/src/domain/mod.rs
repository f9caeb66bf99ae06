//! Domain layer: models and services.

use thiserror::Error;

pub mod balance_service;
pub mod category_service;
pub mod classification;
pub mod ingest_service;
pub mod models;
pub mod payment_service;

pub use balance_service::BalanceService;
pub use category_service::CategoryService;
pub use ingest_service::{ClassifyOutcome, IngestError, IngestReport, IngestService};
pub use payment_service::PaymentService;

/// Service-level failure split the way the HTTP layer needs it: validation
/// problems surface to the user with their message, everything else is an
/// internal error reported generically.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
