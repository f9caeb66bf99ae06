//! AI item classification client.
//!
//! Sends a payment's items and the available categories to the Anthropic
//! messages API and parses the reply into an item-id → category-id mapping.
//! The contract with callers is strict: every failure path — missing
//! credentials, network error, non-2xx status, no JSON object in the reply,
//! parse error — yields an **empty mapping**, which callers treat as
//! "nothing changed". Items then stay uncategorized for later manual or
//! on-demand classification.

use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Classifier configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("CLAUDE_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty());
        Self {
            api_key,
            model: std::env::var("CLAUDE_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: 60,
        }
    }
}

/// Item view handed to the classifier.
#[derive(Debug, Clone)]
pub struct ItemToClassify {
    pub id: i64,
    pub name: String,
    pub qty: f64,
    pub price: i64,
}

/// Category view handed to the classifier; the description doubles as the
/// classification hint.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Error)]
enum ClassifyError {
    #[error("CLAUDE_API_KEY is not set")]
    MissingApiKey,
    #[error("network error: {0}")]
    Network(String),
    #[error("API returned status {0}")]
    Api(reqwest::StatusCode),
    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),
    #[error("no JSON object in the model reply")]
    NoJsonInReply,
}

#[derive(Clone)]
pub struct AiClassifier {
    client: Client,
    config: ClassifierConfig,
}

impl AiClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }

    /// Classify items into categories. Returns the raw model mapping;
    /// empty on any failure. Callers resolve unknown ids through
    /// [`crate::domain::classification::resolve_mapping`].
    pub async fn classify(
        &self,
        items: &[ItemToClassify],
        categories: &[CategoryOption],
    ) -> HashMap<i64, i64> {
        info!("Classifying {} items against {} categories", items.len(), categories.len());
        match self.request_classification(items, categories).await {
            Ok(mapping) => {
                info!("Model returned a mapping for {} items", mapping.len());
                mapping
            }
            Err(e) => {
                error!("AI classification failed: {}", e);
                info!("Items stay uncategorized until classified manually");
                HashMap::new()
            }
        }
    }

    async fn request_classification(
        &self,
        items: &[ItemToClassify],
        categories: &[CategoryOption],
    ) -> Result<HashMap<i64, i64>, ClassifyError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(ClassifyError::MissingApiKey)?;

        let body = json!({
            "model": self.config.model,
            "max_tokens": 1000,
            "temperature": 0.3,
            "messages": [{
                "role": "user",
                "content": build_prompt(items, categories),
            }],
        });

        let response = self
            .client
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifyError::Api(response.status()));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifyError::InvalidResponse(e.to_string()))?;

        let text = data["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ClassifyError::InvalidResponse("no text block".to_string()))?;

        let mapping_json = extract_json_object(text).ok_or(ClassifyError::NoJsonInReply)?;
        let raw: HashMap<String, i64> = serde_json::from_str(mapping_json)
            .map_err(|e| ClassifyError::InvalidResponse(e.to_string()))?;

        Ok(raw
            .into_iter()
            .filter_map(|(item_id, category_id)| {
                item_id.parse::<i64>().ok().map(|id| (id, category_id))
            })
            .collect())
    }
}

/// Pull the first `{…}` object out of the reply text; the model sometimes
/// wraps the JSON in commentary despite the strict answer format.
fn extract_json_object(text: &str) -> Option<&str> {
    static JSON_OBJECT: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

fn build_prompt(items: &[ItemToClassify], categories: &[CategoryOption]) -> String {
    let mut categories_text = String::new();
    for category in categories {
        let _ = writeln!(
            categories_text,
            "- \"{}\" (ID: {}): {}",
            category.name, category.id, category.description
        );
    }

    let mut items_text = String::new();
    for item in items {
        let _ = writeln!(items_text, "\"{}\" (ID: {})", item.name, item.id);
    }

    format!(
        "Ты эксперт по анализу и классификации товаров из чеков магазинов.\n\n\
         ТВОЯ ЗАДАЧА: Классифицируй каждый товар по подходящей категории, \
         ВНИМАТЕЛЬНО читая названия и описания категорий.\n\n\
         ДОСТУПНЫЕ КАТЕГОРИИ:\n{categories_text}\n\
         ТОВАРЫ ДЛЯ КЛАССИФИКАЦИИ:\n{items_text}\n\
         ПРАВИЛА КЛАССИФИКАЦИИ:\n\
         1. ВНИМАТЕЛЬНО читай название каждой категории и её описание\n\
         2. Анализируй название товара по ключевым словам\n\
         3. СТРОГО следуй названиям категорий\n\
         4. Если сомневаешься между двумя категориями - выбирай более специфичную\n\
         5. Возвращай ТОЛЬКО JSON без объяснений\n\n\
         ФОРМАТ ОТВЕТА (СТРОГО):\n\
         {{\n  \"ID_товара\": ID_категории,\n  \"ID_товара\": ID_категории\n}}\n\n\
         Пример:\n{{\n  \"1\": 10,\n  \"2\": 8\n}}\n\n\
         ВАЖНО: Отвечай ТОЛЬКО JSON объектом, без дополнительного текста!"
    )
}
