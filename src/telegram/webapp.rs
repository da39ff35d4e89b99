//! Mini App HTTP API.
//!
//! axum server backing the expense-tracker front-end. Every authenticated
//! route goes through the same two helpers — [`authenticate`] for the
//! init data signature and [`require_db_user`] for the account lookup —
//! so the verification logic exists in exactly one place instead of being
//! pasted into each handler.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::prelude::Requester;
use teloxide::types::ChatId;
use teloxide::Bot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::core::config::Config;
use crate::core::insights::{
    self, build_insights_payload, period_label, period_range, InsightsCategory,
    InsightsTransaction,
};
use crate::spending::{parse_forwarded_transaction, parse_spending_text};
use crate::storage::{db, get_connection, DbPool};
use crate::telegram::messages::motivational_message;
use crate::telegram::webapp_auth::{self, InitDataError, WebAppUser};

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Common body shape: every authenticated POST carries `initData`.
#[derive(Debug, Deserialize)]
pub struct AuthedRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddSpendingRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSpendingRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    #[serde(rename = "spendingId")]
    pub spending_id: Option<i64>,
    pub amount: Option<f64>,
    pub name: Option<String>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListsRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    /// "categories", "currencies" or "both"
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCurrencyRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    #[serde(rename = "currencyId")]
    pub currency_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    pub period: Option<String>,
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Shared state for all endpoints
#[derive(Clone)]
pub struct WebAppState {
    pub db_pool: Arc<DbPool>,
    pub bot: Bot,
    pub config: Arc<Config>,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "ok": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

impl From<InitDataError> for ApiError {
    fn from(err: InitDataError) -> Self {
        match err {
            InitDataError::MissingPayload => ApiError::BadRequest("Missing initData".to_string()),
            // Uniform message for every signature failure.
            InitDataError::HashMismatch => ApiError::Unauthorized("Invalid hash".to_string()),
            InitDataError::MalformedUser => {
                ApiError::BadRequest("No user in initData".to_string())
            }
        }
    }
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(err.to_string())
}

// ============================================================================
// AUTH HELPERS
// ============================================================================

/// Header carrying the init data payload; takes precedence over a body
/// `initData` field so header-only clients need no request body at all.
const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// Verify the init data signature and apply the configured staleness
/// policy. The verifier itself never checks freshness — that cutoff is
/// ours, from `INIT_DATA_MAX_AGE_SECS`.
fn authenticate(
    state: &WebAppState,
    headers: &HeaderMap,
    init_data: Option<&str>,
) -> Result<WebAppUser, ApiError> {
    let from_header = headers
        .get(INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());

    let raw = from_header.or(init_data).unwrap_or_default();
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing initData".to_string()));
    }

    let verified = webapp_auth::verify(raw, &state.config.bot_token)?;

    if let Some(max_age) = state.config.init_data_max_age {
        let now = Utc::now().timestamp();
        match verified.age(now) {
            Some(age) if age >= 0 && age <= max_age.as_secs() as i64 => {}
            _ => return Err(ApiError::Unauthorized("Init data expired".to_string())),
        }
    }

    Ok(verified.user()?)
}

/// Body-side init data for routes whose body carries nothing else; these
/// accept a missing or non-JSON body when the auth header is used instead.
fn body_init_data(body: &Option<Json<AuthedRequest>>) -> Option<&str> {
    body.as_ref().and_then(|Json(req)| req.init_data.as_deref())
}

/// Look up the account behind a verified identity; 404 when the user has
/// never talked to the bot.
fn require_db_user(state: &WebAppState, user: &WebAppUser) -> Result<db::User, ApiError> {
    let conn = get_connection(&state.db_pool).map_err(internal)?;
    db::get_user_by_telegram_id(&conn, user.id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Current month as `[start, start-of-next-month)`.
fn current_month_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let next = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    }
    .unwrap_or(today);
    (start, next)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the Mini App router.
pub fn create_webapp_router(state: WebAppState) -> Router {
    // The front-end is served from another origin during development.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Static front-end assets (HTML, CSS, JS)
        .nest_service("/", ServeDir::new("webapp/static"))
        // API endpoints
        .route("/api/health", get(health_check))
        .route("/api/auth/verify", post(handle_auth_verify))
        .route("/api/spendings/add", post(handle_spendings_add))
        .route("/api/spendings/list", post(handle_spendings_list))
        .route(
            "/api/spendings/uncategorized",
            post(handle_spendings_uncategorized),
        )
        .route("/api/spendings/update", post(handle_spendings_update))
        .route("/api/categories/list", post(handle_categories_list))
        .route("/api/currencies/list", post(handle_currencies_list))
        .route("/api/lists", post(handle_lists))
        .route("/api/user/update-currency", post(handle_update_currency))
        .route(
            "/api/transaction/:telegram_id/log",
            get(handle_transaction_log),
        )
        .route("/api/insights/analyze", post(handle_insights_analyze))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Run the Mini App web server until the process exits.
pub async fn run_webapp_server(port: u16, state: WebAppState) -> anyhow::Result<()> {
    let app = create_webapp_router(state);

    let addr = format!("0.0.0.0:{}", port);
    log::info!("🌐 Starting Mini App web server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API HANDLERS
// ============================================================================

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kopilka-webapp",
    }))
}

/// POST /api/auth/verify — verify init data and register the user.
///
/// Accepts either a raw init data string body or `{ "initData": "..." }`.
async fn handle_auth_verify(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let init_data = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::String(raw)) => raw,
        Ok(value) => value
            .get("initData")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        Err(_) => body,
    };

    let user = authenticate(&state, &headers, Some(init_data.as_str()))?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let db_user = db::upsert_user(
        &conn,
        user.id,
        user.username.as_deref(),
        Some(user.first_name.as_str()),
    )
    .map_err(internal)?;

    log::info!("Verified Mini App session for user {}", user.id);

    Ok(Json(serde_json::json!({ "ok": true, "user": db_user })))
}

/// POST /api/spendings/add — parse "amount name" text and record it.
async fn handle_spendings_add(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Json(req): Json<AddSpendingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let text = req.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Missing text (e.g. \"12.5 Coffee\")".to_string(),
        ));
    }

    let user = authenticate(&state, &headers, req.init_data.as_deref())?;
    let db_user = require_db_user(&state, &user)?;

    let parsed = parse_spending_text(&text).ok_or_else(|| {
        ApiError::BadRequest("Invalid format. Use \"Amount Name\", e.g. \"12.5 Coffee\"".to_string())
    })?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let spending = db::insert_spending(&conn, db_user.id, parsed.amount, &parsed.name, None)
        .map_err(internal)?;

    log::info!(
        "Added spending {} ({}) for user {}",
        spending.id,
        spending.amount,
        user.id
    );

    Ok(Json(serde_json::json!({ "ok": true, "spending": spending })))
}

/// POST /api/spendings/list — current-month spendings plus the total.
async fn handle_spendings_list(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: Option<Json<AuthedRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = authenticate(&state, &headers, body_init_data(&body))?;
    let db_user = require_db_user(&state, &user)?;

    let (start, next) = current_month_range(Utc::now().date_naive());

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let spendings =
        db::spendings_for_range(&conn, db_user.id, start, next).map_err(internal)?;
    let total: f64 = spendings.iter().map(|s| s.amount).sum();

    Ok(Json(serde_json::json!({
        "ok": true,
        "total": total,
        "spendings": spendings,
    })))
}

/// POST /api/spendings/uncategorized — the categorization queue.
async fn handle_spendings_uncategorized(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: Option<Json<AuthedRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = authenticate(&state, &headers, body_init_data(&body))?;
    let db_user = require_db_user(&state, &user)?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let spendings = db::uncategorized_spendings(&conn, db_user.id).map_err(internal)?;

    Ok(Json(serde_json::json!({ "ok": true, "spendings": spendings })))
}

/// POST /api/spendings/update — edit amount/name and optionally assign a
/// category. Only the owner's rows are reachable.
async fn handle_spendings_update(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateSpendingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let spending_id = req
        .spending_id
        .ok_or_else(|| ApiError::BadRequest("Missing spendingId".to_string()))?;
    let amount = req
        .amount
        .ok_or_else(|| ApiError::BadRequest("Missing amount".to_string()))?;
    let name = req
        .name
        .unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing name".to_string()));
    }
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::BadRequest("Invalid amount".to_string()));
    }

    let user = authenticate(&state, &headers, req.init_data.as_deref())?;
    let db_user = require_db_user(&state, &user)?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    db::get_spending_for_user(&conn, spending_id, db_user.id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::NotFound("Spending not found".to_string()))?;

    db::update_spending(&conn, spending_id, db_user.id, amount, name.trim())
        .map_err(internal)?;

    if let Some(category_id) = req.category_id {
        db::set_spending_category(&conn, spending_id, db_user.id, Some(category_id))
            .map_err(internal)?;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// POST /api/categories/list
async fn handle_categories_list(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: Option<Json<AuthedRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authenticate(&state, &headers, body_init_data(&body))?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let categories = db::list_categories(&conn).map_err(internal)?;

    Ok(Json(serde_json::json!({ "ok": true, "categories": categories })))
}

/// POST /api/currencies/list
async fn handle_currencies_list(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: Option<Json<AuthedRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = authenticate(&state, &headers, body_init_data(&body))?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let currencies = db::list_currencies(&conn).map_err(internal)?;
    let current = db::get_user_by_telegram_id(&conn, user.id)
        .map_err(internal)?
        .and_then(|u| u.default_currency_id);

    Ok(Json(serde_json::json!({
        "ok": true,
        "currencies": currencies,
        "currentCurrencyId": current,
    })))
}

/// POST /api/lists — combined categories/currencies fetch so the
/// front-end can populate both pickers with one request.
async fn handle_lists(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: Option<Json<ListsRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let init_data = body.as_ref().and_then(|Json(req)| req.init_data.as_deref());
    let user = authenticate(&state, &headers, init_data)?;
    let kind = body
        .as_ref()
        .and_then(|Json(req)| req.kind.clone())
        .unwrap_or_else(|| "both".to_string());

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let mut result = serde_json::Map::new();
    result.insert("ok".to_string(), serde_json::Value::Bool(true));

    if kind == "categories" || kind == "both" {
        let categories = db::list_categories(&conn).map_err(internal)?;
        result.insert(
            "categories".to_string(),
            serde_json::to_value(categories).map_err(internal)?,
        );
    }

    if kind == "currencies" || kind == "both" {
        let currencies = db::list_currencies(&conn).map_err(internal)?;
        let current = db::get_user_by_telegram_id(&conn, user.id)
            .map_err(internal)?
            .and_then(|u| u.default_currency_id);
        result.insert(
            "currencies".to_string(),
            serde_json::to_value(currencies).map_err(internal)?,
        );
        result.insert(
            "currentCurrencyId".to_string(),
            serde_json::to_value(current).map_err(internal)?,
        );
    }

    Ok(Json(serde_json::Value::Object(result)))
}

/// POST /api/user/update-currency
async fn handle_update_currency(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateCurrencyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let currency_id = req
        .currency_id
        .ok_or_else(|| ApiError::BadRequest("Missing currencyId".to_string()))?;

    let user = authenticate(&state, &headers, req.init_data.as_deref())?;
    let db_user = require_db_user(&state, &user)?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    db::get_currency(&conn, currency_id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::NotFound("Currency not found".to_string()))?;

    db::set_default_currency(&conn, db_user.id, currency_id).map_err(internal)?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /api/transaction/:telegram_id/log?message=...
///
/// Entry point for forwarding automations (e.g. a phone rule that relays
/// bank notifications). Identified by the path telegram_id, not by init
/// data — there is no Mini App session on this path.
async fn handle_transaction_log(
    State(state): State<Arc<WebAppState>>,
    Path(telegram_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let message = params
        .get("message")
        .ok_or_else(|| ApiError::BadRequest("Missing message query parameter".to_string()))?;

    let parsed = parse_forwarded_transaction(message).ok_or_else(|| {
        ApiError::BadRequest("Could not parse transaction from message".to_string())
    })?;

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let db_user = db::get_user_by_telegram_id(&conn, telegram_id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let undefined = db::undefined_category_id(&conn).map_err(internal)?;
    db::insert_spending(&conn, db_user.id, parsed.amount, &parsed.name, undefined)
        .map_err(internal)?;

    // The transaction is already saved; a failed confirmation must not
    // fail the request.
    let name = db_user.first_name.unwrap_or_else(|| "there".to_string());
    if let Err(e) = state
        .bot
        .send_message(ChatId(telegram_id), motivational_message(&name))
        .await
    {
        log::warn!("Failed to send confirmation to {}: {}", telegram_id, e);
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "message": "Transaction logged successfully",
        "transaction": { "amount": parsed.amount, "name": parsed.name },
    })))
}

/// POST /api/insights/analyze — AI analysis of the period's spendings,
/// delivered to the user's chat and echoed in the response.
async fn handle_insights_analyze(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    body: Option<Json<InsightsRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let init_data = body.as_ref().and_then(|Json(req)| req.init_data.as_deref());
    let user = authenticate(&state, &headers, init_data)?;
    let db_user = require_db_user(&state, &user)?;

    if !db_user.ai_features_enabled {
        return Err(ApiError::Forbidden(
            "AI features are not enabled for this user".to_string(),
        ));
    }

    let api_key = state
        .config
        .openai_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("OpenAI API key not configured".to_string()))?;

    let period = body
        .and_then(|Json(req)| req.period)
        .unwrap_or_else(|| "month".to_string());
    let (start, end) = period_range(&period, Utc::now().date_naive());

    let conn = get_connection(&state.db_pool).map_err(internal)?;
    let rows = db::spendings_with_categories_for_range(&conn, db_user.id, start, end)
        .map_err(internal)?;
    drop(conn);

    let transactions: Vec<InsightsTransaction> = rows
        .into_iter()
        .map(|row| InsightsTransaction {
            date: row.spending.date_of_log,
            amount: row.spending.amount,
            name: row.spending.name,
            category: row.category_name.map(|name| InsightsCategory {
                name,
                emoji: row.category_emoji,
            }),
        })
        .collect();

    let payload = build_insights_payload(&period, start, end, transactions);

    let client = insights::InsightsClient::new(api_key, state.config.openai_model.clone())
        .map_err(internal)?;
    let analysis = client
        .analyze(&payload)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to analyze with AI: {e}")))?;

    let label = period_label(&period);
    if let Err(e) = state
        .bot
        .send_message(
            ChatId(db_user.telegram_id),
            format!("📊 AI Analysis for {label}:\n\n{analysis}"),
        )
        .await
    {
        log::warn!("Failed to deliver analysis to {}: {}", db_user.telegram_id, e);
        return Ok(Json(serde_json::json!({
            "ok": true,
            "message": "Analysis completed but failed to send via Telegram",
            "analysis": analysis,
        })));
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "message": "Analysis sent to your Telegram chat",
        "analysis": analysis,
    })))
}

// ============================================================================
// TESTS
// ============================================================================
