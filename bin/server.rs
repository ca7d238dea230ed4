// HOA Ledger - Web Server
// REST API over the transaction repository, importer and password policy

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hoa_ledger::config::AppConfig;
use hoa_ledger::{
    filter_by_type, import_batch, requirements, strength, validate, FinancialSummary,
    NewTransaction, RawImportRecord, SqliteRepository, StrengthLabel, Transaction,
    TransactionRepository, TransactionType,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    repo: Arc<Mutex<SqliteRepository>>,
}

impl AppState {
    fn repo(&self) -> Result<MutexGuard<'_, SqliteRepository>, ApiError> {
        self.repo
            .lock()
            .map_err(|_| ApiError::internal("repository lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error half of every handler: status plus message in the response wrapper
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: &str) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }

    fn not_found(id: &str) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("Transaction {} not found", id),
        }
    }

    fn bad_request(message: String) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("request failed: {:#}", e);
        ApiError::internal(&e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

#[derive(Deserialize)]
struct TypeFilter {
    #[serde(rename = "type")]
    transaction_type: Option<String>,
}

#[derive(Deserialize)]
struct PasswordRequest {
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    is_valid: bool,
    errors: Vec<String>,
    strength: u8,
    label: String,
    requirements: Vec<RequirementResponse>,
}

#[derive(Serialize)]
struct RequirementResponse {
    label: &'static str,
    satisfied: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/transactions?type=income|expense
async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TypeFilter>,
) -> ApiResult<Vec<Transaction>> {
    let all = state.repo()?.list()?;

    match filter.transaction_type {
        Some(kind) => {
            let kind = kind
                .parse::<TransactionType>()
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            ok(filter_by_type(&all, kind))
        }
        None => ok(all),
    }
}

/// GET /api/transactions/:id
async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    match state.repo()?.get(&id)? {
        Some(tx) => ok(tx),
        None => Err(ApiError::not_found(&id)),
    }
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<NewTransaction>,
) -> ApiResult<Transaction> {
    let tx = Transaction::try_from(body).map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.repo()?.create(&tx)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(tx))))
}

/// PUT /api/transactions/:id - replace every field, keeping the id
async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NewTransaction>,
) -> ApiResult<Transaction> {
    let mut tx = Transaction::try_from(body).map_err(|e| ApiError::bad_request(e.to_string()))?;
    tx.id = id;

    if state.repo()?.update(&tx)? {
        ok(tx)
    } else {
        Err(ApiError::not_found(&tx.id))
    }
}

/// DELETE /api/transactions/:id
async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    if state.repo()?.delete(&id)? {
        ok(id)
    } else {
        Err(ApiError::not_found(&id))
    }
}

/// POST /api/transactions/import - normalize a raw batch and store it ahead of existing entries
async fn import_transactions(
    State(state): State<AppState>,
    Json(records): Json<Vec<RawImportRecord>>,
) -> ApiResult<Vec<Transaction>> {
    let transactions = import_batch(&records);
    state.repo()?.prepend_batch(&transactions)?;
    info!(count = transactions.len(), "imported transactions");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(transactions))))
}

/// POST /api/password/validate
async fn check_password(Json(body): Json<PasswordRequest>) -> ApiResult<PasswordResponse> {
    let result = validate(&body.password);
    let score = strength(&body.password);

    ok(PasswordResponse {
        is_valid: result.is_valid,
        errors: result.errors,
        strength: score,
        label: StrengthLabel::from_score(score).name().to_string(),
        requirements: requirements(&body.password)
            .into_iter()
            .map(|(rule, satisfied)| RequirementResponse {
                label: rule.label(),
                satisfied,
            })
            .collect(),
    })
}

/// GET /api/dashboard/summary
async fn dashboard_summary(State(state): State<AppState>) -> ApiResult<FinancialSummary> {
    let transactions = state.repo()?.list()?;
    ok(FinancialSummary::from_transactions(&transactions))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hoa_ledger::log::init_logging("info");

    let config = AppConfig::from_env()?;
    info!("HOA Ledger web server\n{}", config.fmt_console()?);

    let repo = SqliteRepository::open(&config.db_path(), &config.actor)?;
    info!(count = repo.count()?, "database opened");

    // Create shared state
    let state = AppState {
        repo: Arc::new(Mutex::new(repo)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/transactions/import", post(import_transactions))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        .route("/password/validate", post(check_password))
        .route("/dashboard/summary", get(dashboard_summary))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    info!("server running on http://{}", config.server_address);

    axum::serve(listener, app).await?;

    Ok(())
}
