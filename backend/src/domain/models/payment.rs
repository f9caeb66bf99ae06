//! Domain model for a payment.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Participant;

/// One recorded expense event, split between the two participants.
///
/// All amounts are integer minor currency units. Manual entry enforces
/// `paid_egor + paid_syoma == total`; QR ingestion deliberately does not
/// (the whole total goes to the scanning participant until edited).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub total: i64,
    pub paid_egor: i64,
    pub paid_syoma: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Raw decoded QR string; doubles as the natural dedupe key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_qr: Option<String>,
    /// Parsed fiscal payload as recorded at ingestion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fns_payload: Option<String>,
    pub created_by: Participant,
}

/// Fields of a payment about to be created; the store assigns id and
/// timestamp.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub total: i64,
    pub paid_egor: i64,
    pub paid_syoma: i64,
    pub description: Option<String>,
    pub raw_qr: Option<String>,
    pub fns_payload: Option<String>,
    pub created_by: Participant,
}

/// The fields an edit replaces on an existing payment.
#[derive(Debug, Clone)]
pub struct PaymentTotalsUpdate {
    pub total: i64,
    pub paid_egor: i64,
    pub paid_syoma: i64,
    pub description: Option<String>,
}

/// Running 50/50 balance over all payments with a positive total.
///
/// Deltas are computed in real arithmetic (`paid - total/2` per
/// participant); rounding to major units happens only at the presentation
/// edge.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceTotals {
    pub egor_delta: f64,
    pub syoma_delta: f64,
    pub total_spent: i64,
    pub payments_count: u32,
}
