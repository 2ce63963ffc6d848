//! Wire types shared by the REST handlers and the API client.

pub mod stock;
pub mod user;
pub mod watchlist;

pub use stock::{HealthResponse, HistoricalData, PriceBar, StockInfo, StockSearchResult, SymbolValidation};
pub use user::{
    LoginRequest, MessageResponse, PasswordChange, RefreshRequest, RegisterRequest, TokenPair,
    User, UserPreferences, UserUpdate, default_token_type,
};
pub use watchlist::{
    IndexWatchlistCreate, Stock, StockAdd, Watchlist, WatchlistCreate, WatchlistUpdate,
};
