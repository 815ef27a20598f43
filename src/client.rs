use crate::config::ClientConfig;
use crate::data_structures::Ticker;
use crate::error::UpstreamError;
use crate::source::IncomeStatementSource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::value::RawValue;
use tracing::{debug, instrument, warn};

/// Talks to a running relay, local or deployed.
#[derive(Clone, Debug)]
pub struct RelayClient {
    client: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(config: &ClientConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, config.relay_url()))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl IncomeStatementSource for RelayClient {
    #[instrument(skip(self), fields(relay = %self.base_url, symbol = %symbol))]
    async fn raw_income_statements(&self, symbol: &Ticker) -> Result<Box<RawValue>, UpstreamError> {
        let url = format!("{}/income-statement", self.base_url);
        debug!("Requesting income statements from relay");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Relay responded with error status");
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(UpstreamError::RateLimited);
            }
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let raw: Box<RawValue> =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        if !raw.get().starts_with('[') {
            return Err(UpstreamError::Malformed(
                "expected an array of income statements".to_string(),
            ));
        }
        Ok(raw)
    }
}
