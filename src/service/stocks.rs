use tracing::debug;

use crate::error::ApiError;
use crate::market::cache::DEFAULT_TTL;
use crate::market::{MarketData, TtlCache};
use crate::types::{HistoricalData, StockInfo, StockSearchResult};

/// Read-through cache in front of the market gateway.
pub struct StockLookup<'a> {
    pub market: &'a dyn MarketData,
    pub cache: &'a TtlCache,
}

impl StockLookup<'_> {
    pub async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, ApiError> {
        let key = TtlCache::search_key(query);
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }
        let results = self.market.search(query).await?;
        self.cache.set(key, &results, DEFAULT_TTL).await;
        Ok(results)
    }

    pub async fn info(&self, symbol: &str) -> Result<Option<StockInfo>, ApiError> {
        let key = TtlCache::stock_key(symbol, "info");
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(Some(hit));
        }
        let info = self.market.info(symbol).await?;
        if let Some(info) = &info {
            self.cache.set(key, info, DEFAULT_TTL).await;
        } else {
            debug!(symbol, "no quote for symbol");
        }
        Ok(info)
    }

    pub async fn historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<HistoricalData>, ApiError> {
        let key = TtlCache::stock_key(symbol, &format!("historical:{period}:{interval}"));
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(Some(hit));
        }
        let data = self.market.historical(symbol, period, interval).await?;
        if let Some(data) = &data {
            self.cache
                .set(key, data, TtlCache::historical_ttl(interval))
                .await;
        }
        Ok(data)
    }

    /// A cached quote counts as proof the symbol exists.
    pub async fn validate(&self, symbol: &str) -> Result<bool, ApiError> {
        if self
            .cache
            .get::<StockInfo>(&TtlCache::stock_key(symbol, "info"))
            .await
            .is_some()
        {
            return Ok(true);
        }
        Ok(self.market.validate(symbol).await?)
    }
}
