use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::router::AppState;
use crate::types::{HistoricalData, StockInfo, StockSearchResult, SymbolValidation};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalParams {
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_period() -> String {
    "1mo".to_string()
}

fn default_interval() -> String {
    "1d".to_string()
}

pub async fn search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<StockSearchResult>>, ApiError> {
    let q = params.q.trim();
    if q.is_empty() {
        return Err(ApiError::validation("q must not be empty"));
    }
    Ok(Json(state.stocks().search(q).await?))
}

pub async fn info(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(symbol): Path<String>,
) -> Result<Json<StockInfo>, ApiError> {
    state
        .stocks()
        .info(&symbol)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Stock {symbol} not found")))
}

pub async fn historical(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(symbol): Path<String>,
    Query(params): Query<HistoricalParams>,
) -> Result<Json<HistoricalData>, ApiError> {
    state
        .stocks()
        .historical(&symbol, &params.period, &params.interval)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No historical data found for {symbol}")))
}

pub async fn validate(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(symbol): Path<String>,
) -> Result<Json<SymbolValidation>, ApiError> {
    let valid = state.stocks().validate(&symbol).await?;
    Ok(Json(SymbolValidation { symbol, valid }))
}
