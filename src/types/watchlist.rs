use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One symbol held by a watchlist. Symbols are unique within their list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Stock {
    pub fn new(symbol: impl Into<String>, name: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stocks: Vec<Stock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_default: bool,
}

impl Watchlist {
    pub fn contains(&self, symbol: &str) -> bool {
        self.stocks.iter().any(|s| s.symbol == symbol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdd {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stocks: Vec<StockAdd>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchlistUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexWatchlistCreate {
    pub index_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchlist_name: Option<String>,
}
