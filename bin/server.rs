// Cambyze Bank - Web Server
// REST API over the banking services, with Axum

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use cambyze_bank::{
    in_transaction, init_logging, open_database, today, Account, AccountType, BankConfig,
    BankError, BankResult, BankingService, ErrorKind, LedgerRules, Person, SqliteStore, Statement,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    rules: LedgerRules,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiErrorBody>,
}

#[derive(Serialize)]
struct ApiErrorBody {
    kind: ErrorKind,
    message: String,
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

/// Typed rejection rendered as an `ApiResponse` with the matching status
struct ApiError(BankError);

impl From<BankError> for ApiError {
    fn from(err: BankError) -> Self {
        ApiError(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidAccount
        | ErrorKind::InvalidAmount
        | ErrorKind::InvalidDate
        | ErrorKind::InvalidOperationType => StatusCode::BAD_REQUEST,
        ErrorKind::AccountNotFound => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientBalance
        | ErrorKind::SavingsLimitReached
        | ErrorKind::OverdraftForbiddenForSavings => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TechnicalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let message = if self.0.is_functional() {
            self.0.to_string()
        } else {
            error!("Technical error: {:#}", self.0);
            "Technical error".to_string()
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiErrorBody { kind, message }),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Run one service call in its own SQLite transaction.
///
/// A poisoned lock is recovered: the panicking call's transaction was
/// rolled back when it unwound, so the connection is still consistent.
fn with_service<T, F>(state: &AppState, f: F) -> BankResult<T>
where
    F: FnOnce(&BankingService<'_, SqliteStore<'_>>) -> BankResult<T>,
{
    let conn = state.db.lock().unwrap_or_else(|poisoned| {
        warn!("Recovering database connection after a panicked request");
        poisoned.into_inner()
    });
    in_transaction(&conn, |store| f(&BankingService::new(store, state.rules)))
}

// ============================================================================
// Request / Response bodies
// ============================================================================

#[derive(Deserialize)]
struct NewPersonRequest {
    name: String,
    first_name: String,
    email: String,
}

#[derive(Deserialize)]
struct PersonQuery {
    mail: String,
}

#[derive(Deserialize)]
struct NewAccountRequest {
    person_id: String,
    #[serde(default = "default_account_type")]
    account_type: AccountType,
}

fn default_account_type() -> AccountType {
    AccountType::Bank
}

#[derive(Deserialize)]
struct MovementRequest {
    amount: Decimal,
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct StatementQuery {
    as_of: Option<NaiveDate>,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Serialize)]
struct BalanceResponse {
    bank_account_number: String,
    balance: Decimal,
}

#[derive(Serialize)]
struct OverdraftResponse {
    bank_account_number: String,
    overdraft: Decimal,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/persons - Register a person
async fn create_person(
    State(state): State<AppState>,
    Json(req): Json<NewPersonRequest>,
) -> ApiResult<CreatedResponse> {
    let id = with_service(&state, |svc| {
        svc.create_person(&req.name, &req.first_name, &req.email)
    })?;
    Ok(Json(ApiResponse::ok(CreatedResponse { id })))
}

/// GET /api/persons?mail= - Find persons by e-mail
async fn find_persons(
    State(state): State<AppState>,
    Query(query): Query<PersonQuery>,
) -> ApiResult<Vec<Person>> {
    let persons = with_service(&state, |svc| svc.find_persons_by_email(&query.mail))?;
    Ok(Json(ApiResponse::ok(persons)))
}

/// GET /api/persons/:id/accounts - Accounts held by a person
async fn person_accounts(
    State(state): State<AppState>,
    Path(person_id): Path<String>,
) -> ApiResult<Vec<Account>> {
    let accounts = with_service(&state, |svc| svc.accounts_of_person(&person_id))?;
    Ok(Json(ApiResponse::ok(accounts)))
}

/// POST /api/accounts - Open an account
async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<NewAccountRequest>,
) -> ApiResult<CreatedResponse> {
    let ban = with_service(&state, |svc| svc.create_account(&req.person_id, req.account_type))?;
    Ok(Json(ApiResponse::ok(CreatedResponse { id: ban })))
}

/// POST /api/accounts/:ban/deposits
async fn deposit(
    State(state): State<AppState>,
    Path(ban): Path<String>,
    Json(req): Json<MovementRequest>,
) -> ApiResult<BalanceResponse> {
    let date = req.date.unwrap_or_else(today);
    let balance = with_service(&state, |svc| svc.deposit_on(&ban, req.amount, date))?;
    Ok(Json(ApiResponse::ok(BalanceResponse {
        bank_account_number: ban,
        balance,
    })))
}

/// POST /api/accounts/:ban/withdrawals
async fn withdraw(
    State(state): State<AppState>,
    Path(ban): Path<String>,
    Json(req): Json<MovementRequest>,
) -> ApiResult<BalanceResponse> {
    let date = req.date.unwrap_or_else(today);
    let balance = with_service(&state, |svc| svc.withdraw_on(&ban, req.amount, date))?;
    Ok(Json(ApiResponse::ok(BalanceResponse {
        bank_account_number: ban,
        balance,
    })))
}

/// POST /api/accounts/:ban/overdraft
async fn request_overdraft(
    State(state): State<AppState>,
    Path(ban): Path<String>,
) -> ApiResult<OverdraftResponse> {
    let overdraft = with_service(&state, |svc| svc.request_overdraft(&ban))?;
    Ok(Json(ApiResponse::ok(OverdraftResponse {
        bank_account_number: ban,
        overdraft,
    })))
}

/// GET /api/accounts/:ban/statement?as_of=YYYY-MM-DD
async fn monthly_statement(
    State(state): State<AppState>,
    Path(ban): Path<String>,
    Query(query): Query<StatementQuery>,
) -> ApiResult<Statement> {
    let statement = with_service(&state, |svc| svc.monthly_statement(&ban, query.as_of))?;
    Ok(Json(ApiResponse::ok(statement)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/persons", post(create_person).get(find_persons))
        .route("/persons/:id/accounts", get(person_accounts))
        .route("/accounts", post(create_account))
        .route("/accounts/:ban/deposits", post(deposit))
        .route("/accounts/:ban/withdrawals", post(withdraw))
        .route("/accounts/:ban/overdraft", post(request_overdraft))
        .route("/accounts/:ban/statement", get(monthly_statement))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = BankConfig::from_env()?;
    let conn = open_database(&config.db_path)?;
    info!("Database opened: {}", config.db_path.display());

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        rules: config.rules,
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Cambyze Bank API listening on http://{}/api", config.bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let conn = open_database(std::path::Path::new(":memory:")).unwrap();
        AppState {
            db: Arc::new(Mutex::new(conn)),
            rules: LedgerRules::default(),
        }
    }

    fn open_bank_account(state: &AppState) -> String {
        let person = with_service(state, |svc| svc.create_person("Doe", "Jane", "jane@doe.com")).unwrap();
        with_service(state, |svc| svc.create_account(&person, AccountType::Bank)).unwrap()
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |json| Body::from(json.to_string())))
            .unwrap();

        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidAmount), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::AccountNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::SavingsLimitReached),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::TechnicalError),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_with_service_runs_in_transaction() {
        let conn = open_database(std::path::Path::new(":memory:")).unwrap();
        let state = AppState {
            db: Arc::new(Mutex::new(conn)),
            rules: LedgerRules::default(),
        };

        let person = with_service(&state, |svc| svc.create_person("Doe", "Jane", "jane@doe.com")).unwrap();
        let ban = with_service(&state, |svc| svc.create_account(&person, AccountType::Bank)).unwrap();

        let err = with_service(&state, |svc| svc.withdraw(&ban, Decimal::ONE)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

        let balance = with_service(&state, |svc| svc.deposit(&ban, Decimal::TEN)).unwrap();
        assert_eq!(balance, Decimal::TEN);
    }

    #[tokio::test]
    async fn test_deposit_route_returns_envelope() {
        let state = test_state();
        let ban = open_bank_account(&state);

        let uri = format!("/api/accounts/{}/deposits", ban);
        let (status, body) = send(&state, "POST", &uri, Some(serde_json::json!({ "amount": "120.26" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["bank_account_number"], ban.as_str());
        assert_eq!(body["data"]["balance"], "120.26");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_rejected_withdrawal_returns_error_body() {
        let state = test_state();
        let ban = open_bank_account(&state);

        let uri = format!("/api/accounts/{}/withdrawals", ban);
        let (status, body) = send(&state, "POST", &uri, Some(serde_json::json!({ "amount": "10" }))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
        assert_eq!(body["error"]["kind"], "insufficient_balance");

        let (status, body) = send(&state, "GET", "/api/accounts/CAMBYZEBANK-00000099/statement", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "account_not_found");
    }

    #[tokio::test]
    async fn test_statement_route() {
        let state = test_state();
        let ban = open_bank_account(&state);
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        with_service(&state, |svc| svc.deposit_on(&ban, Decimal::TEN, date)).unwrap();

        let uri = format!("/api/accounts/{}/statement?as_of=2025-01-15", ban);
        let (status, body) = send(&state, "GET", &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["account_type"], "Regular bank account");
        assert_eq!(body["data"]["operations"][0]["label"], "Deposit");
        assert_eq!(body["data"]["operations"][0]["date"], "2025-01-10");
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let state = test_state();
        let ban = open_bank_account(&state);

        let shared = state.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = shared.db.lock().unwrap();
            panic!("request handler panicked");
        })
        .join();
        assert!(outcome.is_err());
        assert!(state.db.is_poisoned());

        let balance = with_service(&state, |svc| svc.deposit(&ban, Decimal::TEN)).unwrap();
        assert_eq!(balance, Decimal::TEN);
    }
}
