//! HTTP surface: axum handlers for auth, payments, QR ingestion, category
//! CRUD, classification and the balance report.
//!
//! Response conventions: mutating endpoints require an authenticated
//! participant (401 otherwise); validation failures are 400 with a short
//! message; unexpected failures are 500 with a generic message — raw
//! internal error text never reaches the client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{error, info, warn};
use uuid::Uuid;

use shared::{
    AddItemRequest, AiClassifyResponse, AuthRequest, AuthResponse, BalanceResponse, CategoryDto,
    CategoryUpsertRequest, ClassifyOutcomeResponse, ClassifyRequest, CreatePaymentRequest,
    ErrorResponse, IdResponse, IngestResponse, MeResponse, OkResponse, Participant,
    QrIngestRequest, ScanQrResponse, UpdateItemRequest, UpdatePaymentRequest,
};

use crate::config::Config;
use crate::domain::{
    BalanceService, CategoryService, DomainError, IngestError, IngestService, PaymentService,
};
use crate::qr::QrDecoder;
use crate::storage::json::JsonConnection;
use crate::{ai::AiClassifier, fiscal::FiscalClient};

const SESSION_COOKIE: &str = "budget-session";
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// In-process session store: opaque token → participant role.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, Participant>>>,
}

impl SessionStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Participant>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self, role: Participant) -> String {
        let token = Uuid::new_v4().to_string();
        self.lock().insert(token.clone(), role);
        token
    }

    pub fn role_for(&self, token: &str) -> Option<Participant> {
        self.lock().get(token).copied()
    }

    pub fn remove(&self, token: &str) {
        self.lock().remove(token);
    }
}

/// Participant PINs from config.
#[derive(Clone)]
pub struct PinConfig {
    pub egor: String,
    pub syoma: String,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub categories: CategoryService<JsonConnection>,
    pub payments: PaymentService<JsonConnection>,
    pub balance: BalanceService<JsonConnection>,
    pub ingest: IngestService<JsonConnection>,
    pub decoder: QrDecoder,
    pub sessions: SessionStore,
    pub pins: PinConfig,
}

impl AppState {
    pub fn new(connection: &JsonConnection, config: &Config) -> Self {
        let fiscal = FiscalClient::new(config.fiscal.clone());
        let classifier = AiClassifier::new(config.classifier.clone());
        Self {
            categories: CategoryService::new(connection),
            payments: PaymentService::new(connection),
            balance: BalanceService::new(connection),
            ingest: IngestService::new(connection, fiscal, classifier),
            decoder: QrDecoder::new(),
            sessions: SessionStore::default(),
            pins: PinConfig {
                egor: config.pin_egor.clone(),
                syoma: config.pin_syoma.clone(),
            },
        }
    }
}

/// All API routes, to be nested under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/payment", post(create_payment))
        .route("/payments", get(list_payments))
        .route("/payment/:id", patch(update_payment).delete(delete_payment))
        .route("/payment/:id/classify", post(classify_payment))
        .route("/payment/:id/add-item", post(add_item))
        .route("/item/:id", patch(update_item))
        .route("/ai/classify", post(ai_classify))
        .route("/balance", get(balance))
        .route("/categories", get(list_categories).post(upsert_category))
        .route("/categories/:id", delete(delete_category))
        .route("/scan-qr", post(scan_qr))
        .route("/qr", post(ingest_qr))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn current_role(state: &AppState, jar: &CookieJar) -> Option<Participant> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.role_for(cookie.value()))
}

fn require_role(state: &AppState, jar: &CookieJar) -> Result<Participant, Response> {
    current_role(state, jar).ok_or_else(|| {
        (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Не авторизован"))).into_response()
    })
}

fn internal_error(context: &str, error: anyhow::Error, message: &str) -> Response {
    error!("{}: {:?}", context, error);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(message))).into_response()
}

fn domain_error(context: &str, error: DomainError, generic: &str) -> Response {
    match error {
        DomainError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
        }
        DomainError::Internal(e) => internal_error(context, e, generic),
    }
}

// === Auth ===

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<AuthRequest>,
) -> Response {
    let role = if request.pin == state.pins.egor {
        Some(Participant::Egor)
    } else if request.pin == state.pins.syoma {
        Some(Participant::Syoma)
    } else {
        None
    };

    match role {
        Some(role) => {
            info!("Login as {}", role);
            let token = state.sessions.create(role);
            let cookie = Cookie::build((SESSION_COOKIE, token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            (jar.add(cookie), Json(AuthResponse { success: true, role })).into_response()
        }
        None => {
            warn!("Login attempt with a wrong PIN");
            (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new("Неверный PIN"))).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    (jar, Json(OkResponse::ok())).into_response()
}

async fn me(State(state): State<AppState>, jar: CookieJar) -> Response {
    Json(MeResponse {
        role: current_role(&state, &jar),
    })
    .into_response()
}

// === Payments ===

async fn create_payment(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CreatePaymentRequest>,
) -> Response {
    let role = match require_role(&state, &jar) {
        Ok(role) => role,
        Err(response) => return response,
    };
    match state.payments.create_manual(request, role) {
        Ok(id) => Json(IdResponse::of(id)).into_response(),
        Err(e) => domain_error("Error creating payment", e, "Ошибка создания платежа"),
    }
}

async fn list_payments(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.payments.list_with_items() {
        Ok(payments) => Json(payments).into_response(),
        Err(e) => internal_error("Error listing payments", e, "Ошибка получения платежей"),
    }
}

async fn update_payment(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.payments.update_totals(id, request) {
        Ok(()) => Json(OkResponse::ok()).into_response(),
        Err(e) => internal_error("Error updating payment", e, "Ошибка редактирования платежа"),
    }
}

async fn delete_payment(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.payments.delete(id) {
        Ok(()) => Json(OkResponse::ok()).into_response(),
        Err(e) => internal_error("Error deleting payment", e, "Ошибка удаления платежа"),
    }
}

async fn update_item(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Json(request): Json<UpdateItemRequest>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.payments.update_item(id, request) {
        Ok(()) => Json(OkResponse::ok()).into_response(),
        Err(e) => internal_error("Error updating item", e, "Ошибка редактирования товара"),
    }
}

async fn add_item(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Json(request): Json<AddItemRequest>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    let name = request.name.clone();
    match state.payments.add_item(id, request) {
        Ok(item_id) => Json(serde_json::json!({
            "success": true,
            "id": item_id,
            "message": format!("Товар \"{}\" добавлен к платежу", name),
        }))
        .into_response(),
        Err(e) => domain_error("Error adding item", e, "Ошибка добавления товара"),
    }
}

// === Classification ===

async fn classify_payment(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.ingest.classify_payment(id, false).await {
        Ok(outcome) if outcome.requested == 0 => Json(ClassifyOutcomeResponse {
            success: true,
            updated_count: 0,
            message: "Нет товаров для классификации".to_string(),
        })
        .into_response(),
        Ok(outcome) if outcome.updated > 0 => Json(ClassifyOutcomeResponse {
            success: true,
            updated_count: outcome.updated,
            message: format!(
                "AI классификация завершена. Обновлено {} товаров.",
                outcome.updated
            ),
        })
        .into_response(),
        Ok(_) => Json(ClassifyOutcomeResponse {
            success: false,
            updated_count: 0,
            message: "AI классификация не удалась. Установите категории товаров вручную."
                .to_string(),
        })
        .into_response(),
        Err(e) => internal_error("Error classifying payment", e, "Ошибка AI классификации"),
    }
}

async fn ai_classify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<ClassifyRequest>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    // On-demand classification touches only items without a category yet.
    match state.ingest.classify_payment(request.payment_id, true).await {
        Ok(outcome) if outcome.requested == 0 => Json(AiClassifyResponse {
            success: true,
            classified: 0,
            message: "Нет товаров для классификации".to_string(),
        })
        .into_response(),
        Ok(outcome) => Json(AiClassifyResponse {
            success: true,
            classified: outcome.updated,
            message: format!("Классифицировано {} товаров", outcome.updated),
        })
        .into_response(),
        Err(e) => {
            internal_error("Error classifying items", e, "Ошибка автоматической классификации")
        }
    }
}

// === Balance ===

async fn balance(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.balance.totals() {
        Ok(totals) => Json(BalanceResponse {
            // Rounded to major units for display.
            egor_balance: (totals.egor_delta / 100.0).round() as i64,
            syoma_balance: (totals.syoma_delta / 100.0).round() as i64,
            total_spent: (totals.total_spent as f64 / 100.0).round() as i64,
            payments_count: totals.payments_count,
        })
        .into_response(),
        Err(e) => internal_error("Error computing balance", e, "Ошибка получения баланса"),
    }
}

// === Categories ===

async fn list_categories(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.categories.list() {
        Ok(categories) => {
            let dtos: Vec<CategoryDto> = categories
                .into_iter()
                .map(|c| CategoryDto {
                    id: c.id,
                    name: c.name,
                    description: c.description,
                    color: c.color,
                    monthly_limit: c.monthly_limit,
                    created_at: c.created_at,
                })
                .collect();
            Json(dtos).into_response()
        }
        Err(e) => internal_error("Error listing categories", e, "Ошибка получения категорий"),
    }
}

async fn upsert_category(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<CategoryUpsertRequest>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.categories.upsert(request) {
        Ok(id) => Json(IdResponse::of(id)).into_response(),
        Err(e) => domain_error("Error upserting category", e, "Неверные данные категории"),
    }
}

async fn delete_category(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }
    match state.categories.delete(id) {
        Ok(()) => Json(OkResponse::ok()).into_response(),
        Err(e) => internal_error("Error deleting category", e, "Ошибка удаления категории"),
    }
}

// === QR scanning and ingestion ===

async fn scan_qr(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    if let Err(response) = require_role(&state, &jar) {
        return response;
    }

    let mut image_bytes: Option<Bytes> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse::new("Только изображения разрешены!")),
                        )
                            .into_response();
                    }
                }
                match field.bytes().await {
                    Ok(bytes) => image_bytes = Some(bytes),
                    Err(e) => {
                        warn!("Failed to read the uploaded image: {}", e);
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart upload: {}", e);
                break;
            }
        }
    }

    let Some(bytes) = image_bytes else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Файл изображения не загружен")),
        )
            .into_response();
    };

    info!("Scanning an uploaded image of {} bytes", bytes.len());
    // The filter ladder is CPU-bound; keep it off the async workers.
    let decoder = state.decoder.clone();
    match tokio::task::spawn_blocking(move || decoder.decode_bytes(&bytes)).await {
        Ok(Ok(decoded)) => Json(ScanQrResponse {
            success: true,
            data: decoded.payload,
            method: decoded.method,
            method_name: decoded.method_name.to_string(),
        })
        .into_response(),
        Ok(Err(e)) => {
            info!("QR decode failed: {}", e);
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))).into_response()
        }
        Err(e) => internal_error(
            "QR decode task failed",
            anyhow::Error::from(e),
            "Внутренняя ошибка сервера при сканировании QR",
        ),
    }
}

async fn ingest_qr(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<QrIngestRequest>,
) -> Response {
    let role = match require_role(&state, &jar) {
        Ok(role) => role,
        Err(response) => return response,
    };
    if request.qr.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("QR код обязателен")))
            .into_response();
    }

    match state.ingest.ingest_qr(&request.qr, role).await {
        Ok(report) => Json(IngestResponse {
            success: true,
            id: Some(report.payment_id),
            message: Some(report.message),
            error: None,
        })
        .into_response(),
        // A duplicate is an expected outcome, reported in-band.
        Err(IngestError::Duplicate) => Json(IngestResponse {
            success: false,
            id: None,
            message: None,
            error: Some(IngestError::Duplicate.to_string()),
        })
        .into_response(),
        Err(IngestError::Internal(e)) => {
            internal_error("Error ingesting QR", e, "Ошибка обработки QR кода")
        }
    }
}
