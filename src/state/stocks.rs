use super::Status;
use crate::client::{AuthenticatedClient, ClientError, StockApi};
use crate::types::{HistoricalData, StockInfo, StockSearchResult};

pub struct StockState {
    api: StockApi,
    pub results: Vec<StockSearchResult>,
    pub info: Option<StockInfo>,
    pub historical: Option<HistoricalData>,
    pub status: Status,
}

impl StockState {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self {
            api: StockApi::new(client),
            results: Vec::new(),
            info: None,
            historical: None,
            status: Status::default(),
        }
    }

    pub async fn search(&mut self, query: &str) -> Result<(), ClientError> {
        let api = &self.api;
        self.results = self.status.track(api.search(query)).await?;
        Ok(())
    }

    pub async fn load_info(&mut self, symbol: &str) -> Result<(), ClientError> {
        let api = &self.api;
        self.info = Some(self.status.track(api.info(symbol)).await?);
        Ok(())
    }

    pub async fn load_historical(
        &mut self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<(), ClientError> {
        let api = &self.api;
        self.historical = Some(
            self.status
                .track(api.historical(symbol, period, interval))
                .await?,
        );
        Ok(())
    }

    pub async fn validate(&mut self, symbol: &str) -> Result<bool, ClientError> {
        let api = &self.api;
        Ok(self.status.track(api.validate(symbol)).await?.valid)
    }
}
