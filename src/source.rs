use crate::data_structures::{CompanyProfile, IncomeStatementRecord, Ticker};
use crate::error::UpstreamError;
use async_trait::async_trait;
use serde_json::value::RawValue;

/// Anything that can hand back a company's annual income statements.
///
/// Implemented by the FMP client on the relay side and by the relay client on
/// the caller side, so handlers and the CLI never care which one they hold.
#[async_trait]
pub trait IncomeStatementSource: Send + Sync {
    /// The statements exactly as the source sent them: a JSON array, checked
    /// for shape but never re-encoded.
    async fn raw_income_statements(&self, symbol: &Ticker) -> Result<Box<RawValue>, UpstreamError>;

    /// Typed statements in the order the source returned them.
    async fn annual_income_statements(
        &self,
        symbol: &Ticker,
    ) -> Result<Vec<IncomeStatementRecord>, UpstreamError> {
        let raw = self.raw_income_statements(symbol).await?;
        serde_json::from_str(raw.get()).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    /// Bulk company profiles. Sources without a profile export return
    /// an empty list.
    async fn company_profiles(&self) -> Result<Vec<CompanyProfile>, UpstreamError> {
        Ok(Vec::new())
    }
}
