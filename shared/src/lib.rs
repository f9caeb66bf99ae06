//! Wire types shared between the backend and any frontend.
//!
//! Everything in this crate is a plain serde struct describing the JSON that
//! crosses the HTTP boundary. Field renames pin the wire names where the
//! frontend convention (camelCase) differs from Rust naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two fixed household members.
///
/// Serialized as `"egor"` / `"syoma"` everywhere: in session state, in
/// payment records and in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    Egor,
    Syoma,
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Egor => write!(f, "egor"),
            Participant::Syoma => write!(f, "syoma"),
        }
    }
}

// === Auth ===

#[derive(Debug, Clone, Deserialize)]
pub struct AuthRequest {
    pub pin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub role: Participant,
}

/// Response for `GET /api/me`; `role` is `null` when nobody is logged in.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub role: Option<Participant>,
}

// === Payments ===

/// Inline item supplied with a manual payment creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItemPayload {
    pub name: String,
    /// Quantity, defaults to 1.
    #[serde(default = "default_qty")]
    pub qty: f64,
    /// Line total in minor currency units.
    pub price: i64,
    #[serde(rename = "categoryId")]
    pub category_id: Option<i64>,
}

fn default_qty() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    /// Total in minor currency units.
    pub total: i64,
    #[serde(rename = "paidEgor", default)]
    pub paid_egor: i64,
    #[serde(rename = "paidSyoma", default)]
    pub paid_syoma: i64,
    pub description: Option<String>,
    pub items: Option<Vec<NewItemPayload>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentRequest {
    pub total: i64,
    #[serde(rename = "paidEgor")]
    pub paid_egor: i64,
    #[serde(rename = "paidSyoma")]
    pub paid_syoma: i64,
    pub description: Option<String>,
}

/// Partial item edit; absent fields keep their stored values.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub qty: Option<f64>,
    /// Line total in minor currency units.
    pub price: Option<i64>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<i64>,
}

/// Ad-hoc item added to an existing payment. `price` is in major currency
/// units and converted by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct AddItemRequest {
    pub name: String,
    pub qty: f64,
    pub price: f64,
}

/// Item as rendered inside a payment listing, with its category resolved.
/// A dangling or missing category reference yields `null` category fields.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: i64,
    pub name: String,
    pub qty: f64,
    pub price: i64,
    #[serde(rename = "categoryId")]
    pub category_id: Option<i64>,
    #[serde(rename = "categoryName")]
    pub category_name: Option<String>,
    #[serde(rename = "categoryColor")]
    pub category_color: Option<String>,
}

/// One payment with its items joined in, most recent first in listings.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentWithItems {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub total: i64,
    pub paid_egor: i64,
    pub paid_syoma: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fns_payload: Option<String>,
    pub created_by: Participant,
    pub items: Vec<ItemView>,
}

// === Categories ===

/// Category record as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    /// Monthly spending limit in minor units; 0 means no limit is set.
    pub monthly_limit: i64,
    pub created_at: DateTime<Utc>,
}

/// Create (no `id`) or update (with `id`) a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryUpsertRequest {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    /// Display color as `#rrggbb`.
    pub color: String,
    #[serde(rename = "monthlyLimit")]
    pub monthly_limit: i64,
}

// === Balance ===

/// The 50/50 balance report, amounts rounded to major currency units.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    #[serde(rename = "egorBalance")]
    pub egor_balance: i64,
    #[serde(rename = "syomaBalance")]
    pub syoma_balance: i64,
    #[serde(rename = "totalSpent")]
    pub total_spent: i64,
    #[serde(rename = "paymentsCount")]
    pub payments_count: u32,
}

// === QR ingestion and scanning ===

#[derive(Debug, Clone, Deserialize)]
pub struct QrIngestRequest {
    pub qr: String,
}

/// Result of running the ingestion workflow over a raw QR payload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Successful image scan: the decoded payload plus which enhancement stage
/// produced it (1-based, for observability only).
#[derive(Debug, Clone, Serialize)]
pub struct ScanQrResponse {
    pub success: bool,
    pub data: String,
    pub method: usize,
    #[serde(rename = "methodName")]
    pub method_name: String,
}

// === Classification ===

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyRequest {
    #[serde(rename = "paymentId")]
    pub payment_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcomeResponse {
    pub success: bool,
    #[serde(rename = "updatedCount")]
    pub updated_count: usize,
    pub message: String,
}

/// Response of the uncategorized-items classification endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AiClassifyResponse {
    pub success: bool,
    pub classified: usize,
    pub message: String,
}

// === Generic envelopes ===

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub success: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IdResponse {
    pub success: bool,
    pub id: i64,
}

impl IdResponse {
    pub fn of(id: i64) -> Self {
        Self { success: true, id }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_round_trips_lowercase() {
        let json = serde_json::to_string(&Participant::Egor).unwrap();
        assert_eq!(json, "\"egor\"");
        let back: Participant = serde_json::from_str("\"syoma\"").unwrap();
        assert_eq!(back, Participant::Syoma);
    }

    #[test]
    fn create_payment_request_defaults() {
        let req: CreatePaymentRequest =
            serde_json::from_str(r#"{"total": 1000}"#).unwrap();
        assert_eq!(req.paid_egor, 0);
        assert_eq!(req.paid_syoma, 0);
        assert!(req.items.is_none());
    }

    #[test]
    fn new_item_payload_defaults_qty_to_one() {
        let item: NewItemPayload =
            serde_json::from_str(r#"{"name": "Хлеб", "price": 4500}"#).unwrap();
        assert_eq!(item.qty, 1.0);
        assert!(item.category_id.is_none());
    }
}
