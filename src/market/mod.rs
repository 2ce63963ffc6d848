//! Market data: the provider abstraction, the Yahoo Finance implementation,
//! and the rate-limited gateway the HTTP handlers talk to.

pub mod cache;
pub mod circuit;
pub mod gateway;
pub mod indices;
pub mod yahoo;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error as ThisError;

use crate::types::{HistoricalData, StockInfo, StockSearchResult};

pub use cache::TtlCache;
pub use circuit::{CircuitBreaker, CircuitState};
pub use gateway::MarketGateway;
pub use yahoo::YahooFinance;

#[derive(Debug, ThisError)]
pub enum MarketError {
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Upstream rate limit exceeded")]
    RateLimited,

    #[error("Circuit breaker open; upstream calls suspended")]
    CircuitOpen,

    #[error("Market gateway unavailable: {0}")]
    GatewayClosed(String),
}

/// Whether an error is worth another attempt after a backoff.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for MarketError {
    fn is_retryable(&self) -> bool {
        match self {
            MarketError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            MarketError::UpstreamStatus(status) => status.is_server_error(),
            _ => false,
        }
    }
}

/// Source of quotes, search results and price history.
///
/// `Ok(None)` means the upstream answered but knows nothing about the symbol.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, MarketError>;

    async fn info(&self, symbol: &str) -> Result<Option<StockInfo>, MarketError>;

    async fn historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<HistoricalData>, MarketError>;

    async fn validate(&self, symbol: &str) -> Result<bool, MarketError> {
        Ok(self.info(symbol).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_retry() {
        assert!(MarketError::UpstreamStatus(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!MarketError::UpstreamStatus(StatusCode::NOT_FOUND).is_retryable());
        assert!(!MarketError::RateLimited.is_retryable());
        assert!(!MarketError::CircuitOpen.is_retryable());
    }
}
