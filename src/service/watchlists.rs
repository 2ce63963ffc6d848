use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{info, warn};

use super::stocks::StockLookup;
use crate::error::ApiError;
use crate::market::indices;
use crate::types::{Stock, StockAdd, WatchlistCreate, WatchlistUpdate};

/// Concurrent name lookups while seeding from an index; the gateway still
/// enforces its own rate limit underneath.
const INDEX_LOOKUP_CONCURRENCY: usize = 4;

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let n = value.chars().count();
    if n < min || n > max {
        return Err(ApiError::validation(if min == 0 {
            format!("{field} must be at most {max} characters")
        } else {
            format!("{field} must be between {min} and {max} characters")
        }));
    }
    Ok(())
}

pub fn validate_create(req: &WatchlistCreate) -> Result<(), ApiError> {
    check_len("name", &req.name, 1, 100)?;
    if let Some(d) = &req.description {
        check_len("description", d, 0, 500)?;
    }
    req.stocks.iter().try_for_each(validate_stock_add)
}

pub fn validate_update(req: &WatchlistUpdate) -> Result<(), ApiError> {
    if let Some(n) = &req.name {
        check_len("name", n, 1, 100)?;
    }
    if let Some(d) = &req.description {
        check_len("description", d, 0, 500)?;
    }
    Ok(())
}

pub fn validate_stock_add(req: &StockAdd) -> Result<(), ApiError> {
    check_len("symbol", &req.symbol, 1, 50)?;
    if let Some(n) = &req.name {
        check_len("stock name", n, 0, 200)?;
    }
    Ok(())
}

/// Build entries for a new list, keeping the first occurrence of each symbol.
pub fn initial_stocks(adds: Vec<StockAdd>) -> Vec<Stock> {
    let mut stocks = Vec::with_capacity(adds.len());
    merge_stocks(
        &mut stocks,
        adds.into_iter().map(|a| Stock::new(a.symbol, a.name)),
    );
    stocks
}

/// Append every incoming stock whose symbol is not held yet. Returns how many
/// were added.
pub fn merge_stocks(existing: &mut Vec<Stock>, incoming: impl IntoIterator<Item = Stock>) -> usize {
    let mut held: HashSet<String> = existing.iter().map(|s| s.symbol.clone()).collect();
    let before = existing.len();
    for stock in incoming {
        if held.insert(stock.symbol.clone()) {
            existing.push(stock);
        }
    }
    existing.len() - before
}

pub fn push_unique(existing: &mut Vec<Stock>, stock: Stock) -> Result<(), ApiError> {
    if existing.iter().any(|s| s.symbol == stock.symbol) {
        return Err(ApiError::bad_request("Stock already exists in watchlist"));
    }
    existing.push(stock);
    Ok(())
}

/// Symbols of `index_name` with display names from the market provider.
///
/// A failed lookup never fails the whole index; the symbol stands in for
/// its own name.
pub async fn index_stocks(index_name: &str, lookup: &StockLookup<'_>) -> Result<Vec<Stock>, ApiError> {
    let Some(symbols) = indices::constituents(index_name) else {
        return Err(ApiError::bad_request(format!(
            "Unknown index: {index_name}. Available: {:?}",
            indices::available()
        )));
    };
    info!(index = index_name, count = symbols.len(), "resolving index constituents");

    let owned: Vec<String> = symbols.iter().map(ToString::to_string).collect();
    let stocks = stream::iter(owned)
        .map(|symbol| async move {
            let symbol = symbol.as_str();
            let name = match lookup.info(symbol).await {
                Ok(Some(info)) => info.name,
                Ok(None) => indices::strip_exchange_suffix(symbol).to_string(),
                Err(e) => {
                    warn!(symbol, error = %e, "could not fetch name; using symbol");
                    indices::strip_exchange_suffix(symbol).to_string()
                }
            };
            Stock::new(symbol, Some(name))
        })
        .buffered(INDEX_LOOKUP_CONCURRENCY)
        .collect()
        .await;
    Ok(stocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketData, MarketError, TtlCache};
    use crate::types::{HistoricalData, StockInfo, StockSearchResult};
    use async_trait::async_trait;
    use reqwest::StatusCode;

    /// Knows HDFC Bank, has never heard of SBIN, and fails for the rest.
    struct BankDesk;

    #[async_trait]
    impl MarketData for BankDesk {
        async fn search(&self, _query: &str) -> Result<Vec<StockSearchResult>, MarketError> {
            Ok(Vec::new())
        }

        async fn info(&self, symbol: &str) -> Result<Option<StockInfo>, MarketError> {
            match symbol {
                "HDFCBANK.NS" => Ok(Some(StockInfo {
                    symbol: symbol.to_string(),
                    name: "HDFC Bank Limited".to_string(),
                    exchange: "NSI".to_string(),
                    sector: String::new(),
                    industry: String::new(),
                    market_cap: 0.0,
                    current_price: 1650.0,
                    previous_close: 1640.0,
                    day_high: 1660.0,
                    day_low: 1630.0,
                    volume: 0,
                    average_volume: 0,
                })),
                "SBIN.NS" => Ok(None),
                _ => Err(MarketError::UpstreamStatus(StatusCode::BAD_GATEWAY)),
            }
        }

        async fn historical(
            &self,
            _symbol: &str,
            _period: &str,
            _interval: &str,
        ) -> Result<Option<HistoricalData>, MarketError> {
            Ok(None)
        }
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn index_names_fall_back_to_bare_symbol() {
        let market = BankDesk;
        let cache = TtlCache::new();
        let lookup = StockLookup {
            market: &market,
            cache: &cache,
        };

        let fut = index_stocks("BankNifty", &lookup);
        assert_send(&fut);
        let stocks = fut.await.unwrap();

        assert_eq!(stocks.len(), indices::constituents("banknifty").unwrap().len());
        assert_eq!(stocks[0].symbol, "HDFCBANK.NS");
        assert_eq!(stocks[0].name.as_deref(), Some("HDFC Bank Limited"));
        let sbin = stocks.iter().find(|s| s.symbol == "SBIN.NS").unwrap();
        assert_eq!(sbin.name.as_deref(), Some("SBIN"));
        let pnb = stocks.iter().find(|s| s.symbol == "PNB.NS").unwrap();
        assert_eq!(pnb.name.as_deref(), Some("PNB"));
    }

    #[tokio::test]
    async fn unknown_index_lists_the_known_ones() {
        let market = BankDesk;
        let cache = TtlCache::new();
        let lookup = StockLookup {
            market: &market,
            cache: &cache,
        };
        let err = index_stocks("sensex", &lookup).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m.starts_with("Unknown index: sensex")));
    }

    fn add(symbol: &str) -> StockAdd {
        StockAdd {
            symbol: symbol.to_string(),
            name: None,
        }
    }

    #[test]
    fn merge_skips_existing_symbols() {
        let mut held = initial_stocks(vec![add("TCS.NS"), add("INFY.NS"), add("TCS.NS")]);
        assert_eq!(held.len(), 2);

        let added = merge_stocks(
            &mut held,
            [Stock::new("INFY.NS", None), Stock::new("WIPRO.NS", None)],
        );
        assert_eq!(added, 1);
        assert_eq!(held.last().map(|s| s.symbol.as_str()), Some("WIPRO.NS"));
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut held = vec![Stock::new("TCS.NS", None)];
        let err = push_unique(&mut held, Stock::new("TCS.NS", None)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Stock already exists in watchlist"));
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn length_limits() {
        let ok = WatchlistCreate {
            name: "Banks".into(),
            description: None,
            stocks: vec![add("HDFCBANK.NS")],
        };
        assert!(validate_create(&ok).is_ok());

        let empty_name = WatchlistCreate {
            name: String::new(),
            ..ok.clone()
        };
        assert!(matches!(validate_create(&empty_name), Err(ApiError::Validation(_))));

        let long_desc = WatchlistUpdate {
            name: None,
            description: Some("x".repeat(501)),
        };
        assert!(validate_update(&long_desc).is_err());
        assert!(validate_stock_add(&add(&"A".repeat(51))).is_err());
    }
}
