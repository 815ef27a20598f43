use crate::config::RateLimitConfig;
use crate::data_structures::{IncomeStatementRecord, Ticker};
use crate::error::{ConfigError, QueryError, UpstreamError};
use crate::profiles::ProfileDirectory;
use crate::query::{RawIncomeQuery, run_query};
use crate::source::IncomeStatementSource;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use serde_json::value::RawValue;
use std::sync::Arc;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tracing::{debug, error, info, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn IncomeStatementSource>,
    pub profiles: Arc<ProfileDirectory>,
}

impl AppState {
    pub fn new(source: Arc<dyn IncomeStatementSource>) -> Self {
        Self {
            profiles: Arc::new(ProfileDirectory::new(source.clone())),
            source,
        }
    }
}

/// `Query` whose rejections come back as the same JSON error body as every
/// other failure.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct SymbolParams {
    #[serde(alias = "query")]
    pub symbol: Option<String>,
}

impl SymbolParams {
    fn raw_symbol(&self) -> Result<&str, ApiError> {
        self.symbol
            .as_deref()
            .map(str::trim)
            .filter(|symbol| !symbol.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Symbol is required".to_string()))
    }

    fn ticker(&self) -> Result<Ticker, ApiError> {
        Ok(Ticker::parse(self.raw_symbol()?)?)
    }
}

// --- Errors ---

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Upstream(UpstreamError),
    Profiles(UpstreamError),
    Query(QueryError),
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Upstream(err)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Query(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn upstream_failure(err: UpstreamError, what: &str) -> (StatusCode, String) {
    if err.is_rate_limited() {
        warn!(error = %err, "Upstream rate limit reached");
        return (StatusCode::TOO_MANY_REQUESTS, "Upstream rate limit reached, retry later".to_string());
    }
    error!(error = %err, "Upstream request failed");
    (StatusCode::BAD_GATEWAY, format!("Failed to fetch {what}"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Query(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Upstream(err @ UpstreamError::InvalidSymbol(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Upstream(err) => upstream_failure(err, "income statement"),
            ApiError::Profiles(err) => upstream_failure(err, "company profiles"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// --- Handlers ---

/// Relays the provider's array as-is, so numbers keep their exact text and
/// fields nobody here knows about survive.
#[instrument(skip(state), fields(symbol = ?params.symbol))]
pub async fn income_statement_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SymbolParams>,
) -> Result<Json<Box<RawValue>>, ApiError> {
    debug!("Received income statement request");
    let ticker = params.ticker()?;

    let statements = state.source.raw_income_statements(&ticker).await?;
    info!(%ticker, bytes = statements.get().len(), "Relayed income statements");
    Ok(Json(statements))
}

#[instrument(skip(state, raw), fields(symbol = ?params.symbol))]
pub async fn income_query_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SymbolParams>,
    ApiQuery(raw): ApiQuery<RawIncomeQuery>,
) -> Result<Json<Vec<IncomeStatementRecord>>, ApiError> {
    debug!(?raw, "Received income query request");
    let ticker = params.ticker()?;
    // Validate before spending an upstream call
    let query = raw.into_query()?;

    let records = state.source.annual_income_statements(&ticker).await?;
    let results = run_query(&records, &query);
    info!(
        %ticker,
        fetched = records.len(),
        returned = results.len(),
        sort = ?query.sort,
        "Filtered income statements"
    );
    Ok(Json(results))
}

#[instrument(skip(state), fields(symbol = ?params.symbol))]
pub async fn company_profile_handler(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SymbolParams>,
) -> Result<Response, ApiError> {
    let symbol = params.raw_symbol()?;

    match state.profiles.lookup(symbol).await.map_err(ApiError::Profiles)? {
        Some(profile) => {
            info!(symbol, "Returning company profile");
            Ok((StatusCode::OK, Json(profile)).into_response())
        }
        None => {
            debug!(symbol, "Company not found");
            Err(ApiError::NotFound("Company not found".to_string()))
        }
    }
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Relay routes without transport layers; `main` adds CORS and rate limiting.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/income-statement", get(income_statement_handler))
        .route("/income-statement/query", get(income_query_handler))
        .route("/company-profile", get(company_profile_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Per-peer-IP limit of `requests_per_second` sustained with bursts of
/// `burst_size`. Needs `ConnectInfo<SocketAddr>` on each request.
pub fn with_rate_limit(router: Router, limits: &RateLimitConfig) -> Result<Router, ConfigError> {
    let interval_ms = limits.replenish_interval().as_millis() as u64;
    let governor_conf = GovernorConfigBuilder::default()
        .per_millisecond(interval_ms)
        .burst_size(limits.burst_size)
        .finish()
        .ok_or(ConfigError::Invalid {
            name: "RATE_LIMIT_BURST",
            value: limits.burst_size.to_string(),
        })?;
    debug!(interval_ms, burst = limits.burst_size, "Rate limit configured");

    Ok(router.layer(GovernorLayer::new(Arc::new(governor_conf))))
}
