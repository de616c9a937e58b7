use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;

use platter_core::audit::AuditEvent;
use platter_core::error::PlanError;
use platter_core::models::{
    DayOverview, Food, Meal, MealItem, NewFood, PantryEntry, Role, ShoppingEntry, ShoppingStatus,
    StockStatus,
};
use platter_core::pantry::DEFAULT_UNIT;
use platter_core::service::{FoodLookupProvider, Planner, ScanOutcome};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Clone)]
struct AppState {
    planner: Arc<Planner>,
    lookup: Arc<dyn FoodLookupProvider>,
    catalog_path: Arc<PathBuf>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct TrainingRequest {
    is_training: bool,
}

#[derive(Deserialize)]
struct SwapRequest {
    role: String,
}

#[derive(Deserialize)]
struct ExtraRequest {
    food_id: String,
    grams: f64,
    #[serde(default)]
    as_treat: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct ConfirmRequest {
    consumed_g: f64,
    #[serde(default = "default_true")]
    confirmed: bool,
}

fn default_quantity() -> f64 {
    1.0
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn default_stock() -> StockStatus {
    StockStatus::Available
}

#[derive(Deserialize)]
struct PantryUpsertRequest {
    food_id: String,
    status: StockStatus,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default = "default_unit")]
    unit: String,
}

#[derive(Deserialize)]
struct ScanRequest {
    code: String,
    #[serde(default = "default_stock")]
    status: StockStatus,
}

#[derive(Deserialize)]
struct ShoppingQuery {
    status: Option<ShoppingStatus>,
}

#[derive(Deserialize)]
struct ShoppingAddRequest {
    food_id: String,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default = "default_unit")]
    unit: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        let message = err.to_string();
        match err {
            PlanError::NotFound { .. } => Self::NotFound(message),
            PlanError::InvalidInput(_) => Self::BadRequest(message),
            PlanError::NoCandidate { .. } => Self::Unprocessable(message),
        }
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{date}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let counts = state.planner.health();
    Json(json!({ "status": "ok", "counts": counts }))
}

async fn list_foods(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<Food>> {
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let foods = if params.q.trim().is_empty() {
        let mut all = state.planner.list_foods();
        if params.limit.is_some() {
            all.truncate(limit);
        }
        all
    } else {
        state.planner.search_foods(&params.q, limit)
    };
    Json(foods)
}

async fn create_food(
    State(state): State<AppState>,
    Json(req): Json<NewFood>,
) -> Result<(StatusCode, Json<Food>), ApiError> {
    let food = state.planner.create_manual_food(req)?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn reload_catalog(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let foods = tokio::task::spawn_blocking(move || {
        state.planner.reload_catalog(&state.catalog_path)
    })
    .await
    .context("reload task failed")?
    .context("catalog reload failed")?;
    Ok(Json(json!({ "foods": foods })))
}

async fn get_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayOverview>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.planner.get_day(date)))
}

async fn set_training(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Json(req): Json<TrainingRequest>,
) -> Result<Json<DayOverview>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.planner.set_training(date, req.is_training)))
}

async fn get_meals(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Meal>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.planner.get_meals(date)))
}

async fn generate_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Meal>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.planner.generate_day(date)?))
}

async fn accept_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date(&date)?;
    state.planner.accept_day(date);
    Ok(Json(json!({ "ok": true })))
}

async fn reject_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Meal>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.planner.reject_day(date)?))
}

async fn regenerate_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Meal>, ApiError> {
    Ok(Json(state.planner.regenerate_meal(id)?))
}

async fn add_extra(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ExtraRequest>,
) -> Result<(StatusCode, Json<MealItem>), ApiError> {
    let item = state
        .planner
        .add_extra(id, &req.food_id, req.grams, req.as_treat)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn swap_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SwapRequest>,
) -> Result<Json<MealItem>, ApiError> {
    let role = Role::parse(&req.role)?;
    Ok(Json(state.planner.swap_item(id, role)?))
}

async fn confirm_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<MealItem>, ApiError> {
    Ok(Json(state.planner.confirm_item(
        id,
        req.consumed_g,
        req.confirmed,
    )?))
}

async fn list_pantry(State(state): State<AppState>) -> Json<Vec<PantryEntry>> {
    Json(state.planner.list_pantry())
}

async fn upsert_pantry(
    State(state): State<AppState>,
    Json(req): Json<PantryUpsertRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = state
        .planner
        .upsert_pantry(&req.food_id, req.status, req.quantity, &req.unit)?;
    Ok(Json(json!({ "id": id })))
}

async fn scan_product(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanOutcome>, ApiError> {
    // The lookup provider blocks on its own HTTP call.
    let outcome = tokio::task::spawn_blocking(move || {
        state
            .planner
            .scan_product(state.lookup.as_ref(), &req.code, req.status)
    })
    .await
    .context("scan task failed")??;
    Ok(Json(outcome))
}

async fn list_shopping(
    State(state): State<AppState>,
    Query(params): Query<ShoppingQuery>,
) -> Json<Vec<ShoppingEntry>> {
    let status = params.status.unwrap_or(ShoppingStatus::Pending);
    Json(state.planner.list_shopping(status))
}

async fn add_shopping(
    State(state): State<AppState>,
    Json(req): Json<ShoppingAddRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let id = state
        .planner
        .add_shopping(&req.food_id, req.quantity, &req.unit)?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn mark_bought(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.planner.mark_bought(id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn list_events(State(state): State<AppState>) -> Json<Vec<AuditEvent>> {
    Json(state.planner.events())
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/foods", get(list_foods).post(create_food))
        .route("/api/catalog/reload", post(reload_catalog))
        .route("/api/days/{date}", get(get_day))
        .route("/api/days/{date}/training", put(set_training))
        .route("/api/days/{date}/meals", get(get_meals))
        .route("/api/days/{date}/generate", post(generate_day))
        .route("/api/days/{date}/accept", post(accept_day))
        .route("/api/days/{date}/reject", post(reject_day))
        .route("/api/meals/{id}/regenerate", post(regenerate_meal))
        .route("/api/meals/{id}/extras", post(add_extra))
        .route("/api/items/{id}/swap", post(swap_item))
        .route("/api/items/{id}/confirm", post(confirm_item))
        .route("/api/pantry", get(list_pantry).post(upsert_pantry))
        .route("/api/pantry/scan", post(scan_product))
        .route("/api/shopping", get(list_shopping).post(add_shopping))
        .route("/api/shopping/{id}/bought", post(mark_bought))
        .route("/api/events", get(list_events))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    planner: Planner,
    lookup: Arc<dyn FoodLookupProvider>,
    catalog_path: PathBuf,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let state = AppState {
        planner: Arc::new(planner),
        lookup,
        catalog_path: Arc::new(catalog_path),
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        tracing::warn!(%bind, "listening beyond localhost; the API has no authentication");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    tracing::info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
