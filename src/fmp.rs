use crate::data_structures::{CompanyProfile, Ticker};
use crate::error::UpstreamError;
use crate::source::IncomeStatementSource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use serde_json::value::RawValue;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/stable";

pub struct FmpClient {
    client: Client,
    base_url: String,
    api_key: String,
    statement_limit: Option<usize>,
}

impl fmt::Debug for FmpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FmpClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("statement_limit", &self.statement_limit)
            .finish()
    }
}

impl FmpClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(FmpClient {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            statement_limit: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_statement_limit(mut self, limit: Option<usize>) -> Self {
        self.statement_limit = limit;
        self
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// GET `endpoint` and return the body, mapping transport and status
    /// failures to [`UpstreamError`].
    async fn get_text(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, UpstreamError> {
        debug!(endpoint, "FMP request");

        let response = self
            .client
            .get(self.endpoint_url(endpoint))
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(endpoint, "FMP rate limit hit");
            return Err(UpstreamError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint, %status, "FMP responded with error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }
}

/// Check an income-statement body and hand it back untouched. FMP reports
/// some failures as a 200 with a JSON object carrying the message, so objects
/// are checked before anything else.
fn check_income_statements(body: String) -> Result<Box<RawValue>, UpstreamError> {
    let value: Value =
        serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

    if let Some(object) = value.as_object() {
        let message = object
            .get("Error Message")
            .or_else(|| object.get("error"))
            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()));
        return Err(match message {
            Some(message) => UpstreamError::Provider(message),
            None => UpstreamError::Malformed("expected an array of income statements".to_string()),
        });
    }

    if !value.is_array() {
        return Err(UpstreamError::Malformed(
            "expected an array of income statements".to_string(),
        ));
    }

    RawValue::from_string(body).map_err(|e| UpstreamError::Malformed(e.to_string()))
}

fn parse_profiles_csv(body: &str) -> Result<Vec<CompanyProfile>, UpstreamError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    reader
        .deserialize::<CompanyProfile>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| UpstreamError::Malformed(format!("profile CSV: {e}")))
}

#[async_trait]
impl IncomeStatementSource for FmpClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn raw_income_statements(&self, symbol: &Ticker) -> Result<Box<RawValue>, UpstreamError> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("period", "annual".to_string()),
        ];
        if let Some(limit) = self.statement_limit {
            params.push(("limit", limit.to_string()));
        }

        let body = self.get_text("income-statement", &params).await?;
        let statements = check_income_statements(body)?;
        info!(bytes = statements.get().len(), "Income statements loaded");
        Ok(statements)
    }

    #[instrument(skip(self))]
    async fn company_profiles(&self) -> Result<Vec<CompanyProfile>, UpstreamError> {
        let body = self
            .get_text("profile-bulk", &[("part", "0".to_string())])
            .await?;
        let profiles = parse_profiles_csv(&body)?;
        info!(profiles = profiles.len(), "Fetched company profiles");
        Ok(profiles)
    }
}
