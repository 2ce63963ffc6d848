use super::error::ClientError;
use super::http::{ApiRequest, AuthenticatedClient};
use crate::types::{HistoricalData, StockInfo, StockSearchResult, SymbolValidation};

/// `/stocks/*` routes.
#[derive(Clone)]
pub struct StockApi {
    client: AuthenticatedClient,
}

impl StockApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, ClientError> {
        let req = ApiRequest::get(&["stocks", "search"]).query("q", query);
        self.client.send_json(req).await
    }

    pub async fn info(&self, symbol: &str) -> Result<StockInfo, ClientError> {
        self.client
            .send_json(ApiRequest::get(&["stocks", symbol, "info"]))
            .await
    }

    pub async fn historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<HistoricalData, ClientError> {
        let req = ApiRequest::get(&["stocks", symbol, "historical"])
            .query("period", period)
            .query("interval", interval);
        self.client.send_json(req).await
    }

    pub async fn validate(&self, symbol: &str) -> Result<SymbolValidation, ClientError> {
        self.client
            .send_json(ApiRequest::get(&["stocks", symbol, "validate"]))
            .await
    }
}
