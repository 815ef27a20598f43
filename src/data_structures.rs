use crate::error::UpstreamError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// --- Core Data Structures ---

/// One fiscal year of income-statement figures for one company.
///
/// Only the fields the query engine works on are typed. Everything else the
/// provider sends is kept in `extra`. Missing or `null` figures read as zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStatementRecord {
    pub date: NaiveDate,
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub revenue: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub net_income: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub eps: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

impl IncomeStatementRecord {
    pub fn new(symbol: &str, date: NaiveDate, revenue: f64, net_income: f64, eps: f64) -> Self {
        Self {
            date,
            symbol: symbol.to_string(),
            revenue,
            net_income,
            eps,
            extra: Map::new(),
        }
    }
}

const MAX_TICKER_LEN: usize = 20;

/// A validated, upper-cased ticker symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ticker(String);

impl Ticker {
    /// Trims and upper-cases `raw`, rejecting anything that cannot be a ticker
    /// before it reaches the network.
    pub fn parse(raw: &str) -> Result<Self, UpstreamError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_TICKER_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'));

        if !valid {
            return Err(UpstreamError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Company Profiles ---

// One row of the provider's bulk profile CSV, column name -> raw value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyProfile(pub BTreeMap<String, String>);

impl CompanyProfile {
    pub fn symbol(&self) -> Option<&str> {
        self.0.get("symbol").map(|s| s.trim())
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }
}
