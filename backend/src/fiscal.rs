//! Fiscal receipt lookup client.
//!
//! Exchanges a parsed receipt descriptor for the receipt's line items via a
//! single POST to the lookup service. The contract is deliberately
//! best-effort: any outcome other than a `code == 1` response with an item
//! array is "no data available", and the caller records the payment without
//! items. The call is never retried.

use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

use crate::qr::ReceiptPayload;

const USER_AGENT: &str = "family-budget/1.0";

/// Lookup service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct FiscalConfig {
    /// Shared secret token for the lookup service. Absent token means the
    /// lookup is skipped entirely.
    pub token: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl FiscalConfig {
    pub fn from_env() -> Self {
        Self {
            token: std::env::var("FNS_API_TOKEN").ok().filter(|t| !t.is_empty()),
            base_url: std::env::var("FNS_API_URL")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "https://proverkacheka.com".to_string()),
            timeout_secs: 30,
        }
    }
}

/// One line item from a fetched receipt, amounts in minor currency units.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: f64,
    /// Line total.
    pub sum: i64,
    /// Unit price.
    pub price: i64,
}

#[derive(Clone)]
pub struct FiscalClient {
    client: Client,
    config: FiscalConfig,
}

impl FiscalClient {
    pub fn new(config: FiscalConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }

    /// Fetch the receipt's line items. Returns `None` on every failure path:
    /// missing token, network error, non-2xx status, malformed body or a
    /// "receipt not found" response code.
    pub async fn fetch_items(&self, payload: &ReceiptPayload) -> Option<Vec<ReceiptLine>> {
        let token = match &self.config.token {
            Some(token) => token,
            None => {
                warn!("FNS_API_TOKEN is not set, skipping receipt lookup");
                return None;
            }
        };

        let qrraw = build_qrraw(payload);
        let url = format!("{}/api/v1/check/get", self.config.base_url);
        info!("Requesting receipt items from {}", url);

        let params = [("token", token.as_str()), ("qrraw", qrraw.as_str())];
        let response = match self
            .client
            .post(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Receipt lookup request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            error!("Receipt lookup failed with status {}", response.status());
            return None;
        }

        let data: serde_json::Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                error!("Receipt lookup returned a malformed body: {}", e);
                return None;
            }
        };

        if data["code"].as_i64() != Some(1) {
            info!(
                "Receipt not found or response not usable (code: {})",
                data["code"]
            );
            return None;
        }

        let items = data["data"]["json"]["items"].as_array()?;
        let lines: Vec<ReceiptLine> = items.iter().map(parse_line).collect();
        info!("Receipt lookup returned {} items", lines.len());
        Some(lines)
    }
}

fn parse_line(item: &serde_json::Value) -> ReceiptLine {
    ReceiptLine {
        name: item["name"]
            .as_str()
            .filter(|n| !n.is_empty())
            .unwrap_or("Неизвестный товар")
            .to_string(),
        quantity: item["quantity"]
            .as_f64()
            .filter(|q| *q != 0.0)
            .unwrap_or(1.0),
        sum: item["sum"].as_f64().map(|v| v.round() as i64).unwrap_or(0),
        price: item["price"].as_f64().map(|v| v.round() as i64).unwrap_or(0),
    }
}

/// Rebuild the compact query-string payload the lookup service expects from
/// the parsed descriptor. The display timestamp converts back to the compact
/// receipt form; a missing or unconvertible date falls back to a fixed
/// placeholder, matching the lenient service behavior.
fn build_qrraw(payload: &ReceiptPayload) -> String {
    static DISPLAY_DATE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(\d{2})\.(\d{2})\.(\d{4}) (\d{2}):(\d{2})$").expect("valid regex")
    });

    let t = payload
        .date
        .as_deref()
        .and_then(|date| DISPLAY_DATE.captures(date))
        .map(|c| format!("{}{}{}T{}{}", &c[3], &c[2], &c[1], &c[4], &c[5]))
        .unwrap_or_else(|| "20250101T0000".to_string());

    format!(
        "t={}&s={}&fn={}&i={}&fp={}&n=1",
        t,
        payload.sum.unwrap_or_default(),
        payload.fiscal_number.as_deref().unwrap_or_default(),
        payload.document_index.as_deref().unwrap_or_default(),
        payload.fiscal_sign.as_deref().unwrap_or_default(),
    )
}
