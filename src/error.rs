//! Error types shared by the relay, the query engine and the client.

use thiserror::Error;

/// Failure talking to an upstream income-statement source.
///
/// Every variant is non-fatal for the caller: the request can simply be
/// issued again.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited by upstream provider")]
    RateLimited,

    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream provider error: {0}")]
    Provider(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited)
    }
}

/// Errors raised while building or running an income query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid sort field {0:?}, expected one of date, revenue, netIncome")]
    InvalidSortField(String),

    #[error("invalid {name} bound {value:?}, expected YYYY or YYYY-MM-DD")]
    InvalidBound { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
