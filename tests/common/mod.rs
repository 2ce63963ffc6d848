#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stockwatch::config::Config;
use stockwatch::db::Storage;
use stockwatch::market::{MarketData, MarketError};
use stockwatch::types::{HistoricalData, PriceBar, StockInfo, StockSearchResult};
use stockwatch::{AppState, app_router};
use tokio::net::TcpListener;

/// Deterministic market provider: knows a handful of NSE names.
#[derive(Default)]
pub struct StubMarket {
    pub info_calls: AtomicUsize,
}

const KNOWN: &[(&str, &str)] = &[
    ("TCS.NS", "Tata Consultancy Services Limited"),
    ("INFY.NS", "Infosys Limited"),
    ("RELIANCE.NS", "Reliance Industries Limited"),
];

fn known_name(symbol: &str) -> Option<&'static str> {
    KNOWN.iter().find(|(s, _)| *s == symbol).map(|(_, n)| *n)
}

#[async_trait]
impl MarketData for StubMarket {
    async fn search(&self, query: &str) -> Result<Vec<StockSearchResult>, MarketError> {
        let q = query.to_lowercase();
        Ok(KNOWN
            .iter()
            .filter(|(s, n)| s.to_lowercase().contains(&q) || n.to_lowercase().contains(&q))
            .map(|(s, n)| StockSearchResult {
                symbol: s.to_string(),
                name: n.to_string(),
                exchange: "NSE".to_string(),
                kind: "EQUITY".to_string(),
            })
            .collect())
    }

    async fn info(&self, symbol: &str) -> Result<Option<StockInfo>, MarketError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(known_name(symbol).map(|name| StockInfo {
            symbol: symbol.to_string(),
            name: name.to_string(),
            exchange: "NSE".to_string(),
            sector: "N/A".to_string(),
            industry: "N/A".to_string(),
            market_cap: 0.0,
            current_price: 100.0,
            previous_close: 99.0,
            day_high: 101.0,
            day_low: 98.0,
            volume: 1_000,
            average_volume: 0,
        }))
    }

    async fn historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<HistoricalData>, MarketError> {
        if known_name(symbol).is_none() {
            return Ok(None);
        }
        let bar = PriceBar {
            date: chrono::Utc::now(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10,
        };
        Ok(Some(HistoricalData {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval: interval.to_string(),
            data: vec![bar],
        }))
    }
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.auth.secret_key = "integration-test-secret".to_string();
    cfg.database.url = "sqlite::memory:".to_string();
    cfg
}

pub async fn test_state(cfg: Config) -> (AppState, Arc<StubMarket>) {
    let storage = Storage::connect(&cfg.database.url)
        .await
        .expect("in-memory database");
    let market = Arc::new(StubMarket::default());
    (AppState::new(storage, market.clone(), cfg), market)
}

/// Serve the full router on an ephemeral port; returns the API base URL.
pub async fn spawn_server() -> (String, Arc<StubMarket>) {
    let (state, market) = test_state(test_config()).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app_router(state)).await.ok();
    });
    (format!("http://{addr}/api/v1"), market)
}
