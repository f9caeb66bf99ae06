//! Permissive parser for the receipt QR payload.
//!
//! The payload is a query-string-shaped string like
//! `t=20250630T1736&s=1234.56&fn=9960440300000001&i=12345&fp=1234567890&n=1`,
//! sometimes prefixed with junk up to a `?`. Every field is independently
//! optional: a malformed or partial payload still yields a usable
//! structure, it only limits which downstream steps can run.

use chrono::NaiveDateTime;
use serde::Serialize;
use url::form_urlencoded;

/// Structured receipt descriptor extracted from a decoded QR string.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ReceiptPayload {
    /// Receipt timestamp in display form (`DD.MM.YYYY HH:MM`), or the raw
    /// `t` value when it does not fit the compact layout.
    pub date: Option<String>,
    /// Receipt total in major currency units.
    pub sum: Option<f64>,
    /// Fiscal storage number.
    #[serde(rename = "fn")]
    pub fiscal_number: Option<String>,
    /// Fiscal document index.
    #[serde(rename = "i")]
    pub document_index: Option<String>,
    /// Fiscal document sign.
    #[serde(rename = "fp")]
    pub fiscal_sign: Option<String>,
}

impl ReceiptPayload {
    /// Parse a raw decoded QR string. Never fails; unknown keys are
    /// ignored, empty values count as absent.
    pub fn parse(raw: &str) -> Self {
        let query = raw.split_once('?').map(|(_, q)| q).unwrap_or(raw);
        let mut payload = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "t" => payload.date = Some(format_receipt_timestamp(&value)),
                "s" => payload.sum = value.parse::<f64>().ok().filter(|s| s.is_finite()),
                "fn" => payload.fiscal_number = Some(value.into_owned()),
                "i" => payload.document_index = Some(value.into_owned()),
                "fp" => payload.fiscal_sign = Some(value.into_owned()),
                _ => {}
            }
        }
        payload
    }

    /// Whether the payload carries everything the fiscal lookup needs:
    /// all three fiscal identifiers plus the total.
    pub fn has_fiscal_fields(&self) -> bool {
        self.fiscal_number.is_some()
            && self.document_index.is_some()
            && self.fiscal_sign.is_some()
            && self.sum.is_some()
    }

    /// Receipt total converted to integer minor units.
    pub fn total_minor_units(&self) -> Option<i64> {
        self.sum.map(|s| (s * 100.0).round() as i64)
    }
}

/// Convert the compact `YYYYMMDDTHHMM[SS]` receipt timestamp into
/// `DD.MM.YYYY HH:MM`. Anything that does not fit passes through raw.
fn format_receipt_timestamp(t: &str) -> String {
    NaiveDateTime::parse_from_str(t, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y%m%dT%H%M"))
        .map(|dt| dt.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|_| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_payload() {
        let payload = ReceiptPayload::parse(
            "t=20250630T1736&s=1234.56&fn=9960440300000001&i=12345&fp=1234567890&n=1",
        );
        assert_eq!(payload.date.as_deref(), Some("30.06.2025 17:36"));
        assert_eq!(payload.sum, Some(1234.56));
        assert_eq!(payload.fiscal_number.as_deref(), Some("9960440300000001"));
        assert_eq!(payload.document_index.as_deref(), Some("12345"));
        assert_eq!(payload.fiscal_sign.as_deref(), Some("1234567890"));
        assert!(payload.has_fiscal_fields());
        assert_eq!(payload.total_minor_units(), Some(123_456));
    }

    #[test]
    fn drops_prefix_up_to_question_mark() {
        let payload = ReceiptPayload::parse("https://check.example/path?s=10.00&t=20240101T0930");
        assert_eq!(payload.sum, Some(10.0));
        assert_eq!(payload.date.as_deref(), Some("01.01.2024 09:30"));
    }

    #[test]
    fn timestamp_with_seconds_is_accepted() {
        let payload = ReceiptPayload::parse("t=20200727T174700");
        assert_eq!(payload.date.as_deref(), Some("27.07.2020 17:47"));
    }

    #[test]
    fn unparseable_timestamp_passes_through_raw() {
        let payload = ReceiptPayload::parse("t=вчера");
        assert_eq!(payload.date.as_deref(), Some("вчера"));
    }

    #[test]
    fn partial_payload_is_not_an_error() {
        let payload = ReceiptPayload::parse("s=500");
        assert_eq!(payload.sum, Some(500.0));
        assert_eq!(payload.total_minor_units(), Some(50_000));
        assert!(!payload.has_fiscal_fields());
        assert!(payload.date.is_none());
    }

    #[test]
    fn garbage_yields_an_empty_payload() {
        let payload = ReceiptPayload::parse("definitely not a receipt");
        assert_eq!(payload, ReceiptPayload::default());
        assert!(!payload.has_fiscal_fields());
    }

    #[test]
    fn empty_values_count_as_absent() {
        let payload = ReceiptPayload::parse("t=&s=&fn=&i=1&fp=2");
        assert!(payload.date.is_none());
        assert!(payload.sum.is_none());
        assert!(payload.fiscal_number.is_none());
        assert!(!payload.has_fiscal_fields());
    }

    #[test]
    fn malformed_sum_is_ignored() {
        let payload = ReceiptPayload::parse("s=abc&fn=1&i=2&fp=3");
        assert!(payload.sum.is_none());
        assert!(!payload.has_fiscal_fields());
    }

    #[test]
    fn rounds_total_to_minor_units() {
        let payload = ReceiptPayload::parse("s=5.999");
        assert_eq!(payload.total_minor_units(), Some(600));
    }
}
