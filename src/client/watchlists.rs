use super::error::ClientError;
use super::http::{ApiRequest, AuthenticatedClient};
use crate::types::{IndexWatchlistCreate, StockAdd, Watchlist, WatchlistCreate, WatchlistUpdate};

/// `/watchlists/*` routes.
#[derive(Clone)]
pub struct WatchlistApi {
    client: AuthenticatedClient,
}

impl WatchlistApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Watchlist>, ClientError> {
        self.client.send_json(ApiRequest::get(&["watchlists"])).await
    }

    pub async fn create(&self, req: &WatchlistCreate) -> Result<Watchlist, ClientError> {
        self.client
            .send_json(ApiRequest::post(&["watchlists"]).json(req)?)
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Watchlist, ClientError> {
        self.client.send_json(ApiRequest::get(&["watchlists", id])).await
    }

    pub async fn update(&self, id: &str, req: &WatchlistUpdate) -> Result<Watchlist, ClientError> {
        self.client
            .send_json(ApiRequest::put(&["watchlists", id]).json(req)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        self.client.send_empty(ApiRequest::delete(&["watchlists", id])).await
    }

    pub async fn add_stock(&self, id: &str, stock: &StockAdd) -> Result<Watchlist, ClientError> {
        self.client
            .send_json(ApiRequest::post(&["watchlists", id, "stocks"]).json(stock)?)
            .await
    }

    pub async fn remove_stock(&self, id: &str, symbol: &str) -> Result<Watchlist, ClientError> {
        self.client
            .send_json(ApiRequest::delete(&["watchlists", id, "stocks", symbol]))
            .await
    }

    pub async fn create_from_index(
        &self,
        req: &IndexWatchlistCreate,
    ) -> Result<Watchlist, ClientError> {
        self.client
            .send_json(ApiRequest::post(&["watchlists", "from-index"]).json(req)?)
            .await
    }
}
