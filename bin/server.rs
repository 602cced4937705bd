// FuelEU Ledger - Web Server
// REST API with Axum over the SQLite store

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use fueleu_ledger::{
    init_tracing, AppConfig, BankRequest, BankingLedger, ComparisonEngine, ComplianceError,
    ComplianceService, ComputeCbRequest, CreatePoolRequest, ErrorClass, PoolService, RouteFilters,
    RouteService, SqliteStore, VERSION,
};

/// Intensity and fuel assumed by GET /compliance/cb when the query omits them
const DEFAULT_ACTUAL_INTENSITY: f64 = 90.0;
const DEFAULT_FUEL_CONSUMPTION: f64 = 5000.0;

#[derive(Parser)]
#[command(name = "fueleu-server")]
#[command(about = "FuelEU Maritime compliance ledger - HTTP API", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FUELEU_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<SqliteStore>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body: {"error": message}
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        let status = match err.class() {
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Internal => {
                error!(kind = err.kind(), "request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

// Malformed bodies and query strings answer 400 with the usual error body
// instead of axum's plain-text 422
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipYearQuery {
    ship_id: Option<String>,
    year: Option<i32>,
    actual_intensity: Option<f64>,
    fuel_consumption: Option<f64>,
}

impl ShipYearQuery {
    fn required(&self) -> ApiResult<(String, i32)> {
        match (&self.ship_id, self.year) {
            (Some(ship_id), Some(year)) => Ok((ship_id.clone(), year)),
            _ => Err(ApiError::bad_request("shipId and year are required")),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordsQuery {
    ship_id: Option<String>,
    year: Option<i32>,
}

#[derive(Deserialize)]
struct PoolsQuery {
    year: Option<i32>,
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

/// GET /routes?vesselType=&fuelType=&year=
async fn get_routes(
    State(state): State<AppState>,
    filters: Result<Query<RouteFilters>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filters) = filters?;
    let routes = RouteService::new(state.store.as_ref()).get_routes(&filters)?;
    Ok(Json(routes))
}

/// POST /routes/:routeId/baseline
async fn set_baseline(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let route = RouteService::new(state.store.as_ref()).set_baseline(&route_id)?;
    Ok(Json(route))
}

/// GET /routes/comparison?vesselType=&fuelType=&year=
async fn get_comparison(
    State(state): State<AppState>,
    filters: Result<Query<RouteFilters>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filters) = filters?;
    let comparisons = ComparisonEngine::new(state.store.as_ref()).compute(&filters)?;
    Ok(Json(comparisons))
}

/// GET /compliance/cb?shipId=&year=[&actualIntensity=&fuelConsumption=]
/// Computes and stores the CB for the ship-year
async fn compute_cb(
    State(state): State<AppState>,
    query: Result<Query<ShipYearQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let (ship_id, year) = query.required()?;

    let record = ComplianceService::new(state.store.as_ref()).compute_cb(&ComputeCbRequest {
        ship_id,
        year,
        actual_intensity: query.actual_intensity.unwrap_or(DEFAULT_ACTUAL_INTENSITY),
        fuel_consumption: query.fuel_consumption.unwrap_or(DEFAULT_FUEL_CONSUMPTION),
    })?;
    Ok(Json(record))
}

/// GET /compliance/adjusted-cb?shipId=&year=
async fn adjusted_cb(
    State(state): State<AppState>,
    query: Result<Query<ShipYearQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let (ship_id, year) = query.required()?;
    let store = state.store.as_ref();

    let adjusted = BankingLedger::new(store, store).adjusted_cb(&ship_id, year)?;
    Ok(Json(adjusted))
}

/// GET /banking/records?shipId=[&year=]
async fn bank_records(
    State(state): State<AppState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let ship_id = query
        .ship_id
        .ok_or_else(|| ApiError::bad_request("shipId is required"))?;
    let store = state.store.as_ref();

    let records = BankingLedger::new(store, store).records(&ship_id, query.year)?;
    Ok(Json(records))
}

/// POST /banking/bank
async fn bank_surplus(
    State(state): State<AppState>,
    request: Result<Json<BankRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = request?;
    let store = state.store.as_ref();
    let entry = BankingLedger::new(store, store).bank_surplus(&request)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /banking/apply
async fn apply_banked(
    State(state): State<AppState>,
    request: Result<Json<BankRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = request?;
    let store = state.store.as_ref();
    let summary = BankingLedger::new(store, store).apply_banked(&request)?;
    Ok(Json(summary))
}

/// POST /pools
async fn create_pool(
    State(state): State<AppState>,
    request: Result<Json<CreatePoolRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = request?;
    let store = state.store.as_ref();
    let pool = PoolService::new(store, store).create_pool(&request)?;
    Ok((StatusCode::CREATED, Json(pool)))
}

/// GET /pools?year=
async fn list_pools(
    State(state): State<AppState>,
    query: Result<Query<PoolsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let year = query
        .year
        .ok_or_else(|| ApiError::bad_request("year is required"))?;
    let store = state.store.as_ref();

    let pools = PoolService::new(store, store).find_by_year(year)?;
    Ok(Json(pools))
}

/// GET /pools/:id
async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = state.store.as_ref();

    let pool = PoolService::new(store, store)
        .find_by_id(&id)?
        .ok_or_else(|| ApiError::not_found("Pool not found"))?;
    Ok(Json(pool))
}

// ============================================================================
// Main Server
// ============================================================================

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Routes
        .route("/routes", get(get_routes))
        .route("/routes/comparison", get(get_comparison))
        .route("/routes/:route_id/baseline", post(set_baseline))
        // Compliance
        .route("/compliance/cb", get(compute_cb))
        .route("/compliance/adjusted-cb", get(adjusted_cb))
        // Banking
        .route("/banking/records", get(bank_records))
        .route("/banking/bank", post(bank_surplus))
        .route("/banking/apply", post(apply_banked))
        // Pools
        .route("/pools", post(create_pool).get(list_pools))
        .route("/pools/:id", get(get_pool))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    init_tracing(&config.log_level, config.log_json)?;

    let store = SqliteStore::open(&config.database_path)?;
    info!(path = %config.database_path.display(), "database opened");

    let state = AppState {
        store: Arc::new(store),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, version = VERSION, "🚀 server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
