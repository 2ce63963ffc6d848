use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::db::DbWatchlist;
use crate::error::ApiError;
use crate::market::indices;
use crate::middleware::{ApiJson, CurrentUser};
use crate::router::AppState;
use crate::service::watchlists::{
    index_stocks, initial_stocks, push_unique, validate_create, validate_stock_add,
    validate_update,
};
use crate::types::{
    IndexWatchlistCreate, Stock, StockAdd, Watchlist, WatchlistCreate, WatchlistUpdate,
};

fn not_found() -> ApiError {
    ApiError::not_found("Watchlist not found")
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Watchlist>>, ApiError> {
    let lists = state.storage.list_watchlists(&user.id).await?;
    Ok(Json(lists.into_iter().map(Watchlist::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<WatchlistCreate>,
) -> Result<(StatusCode, Json<Watchlist>), ApiError> {
    validate_create(&req)?;
    let watchlist = DbWatchlist::new(&user.id, req.name, req.description, initial_stocks(req.stocks));
    state.storage.insert_watchlist(&watchlist).await?;
    info!(user_id = %user.id, watchlist_id = %watchlist.id, "watchlist created");
    Ok((StatusCode::CREATED, Json(watchlist.into())))
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Watchlist>, ApiError> {
    let watchlist = state
        .storage
        .get_watchlist(&id, &user.id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(watchlist.into()))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<WatchlistUpdate>,
) -> Result<Json<Watchlist>, ApiError> {
    validate_update(&req)?;
    let watchlist = state
        .storage
        .update_watchlist_meta(&id, &user.id, req.name, req.description)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(watchlist.into()))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.storage.delete_watchlist(&id, &user.id).await? {
        return Err(not_found());
    }
    info!(user_id = %user.id, watchlist_id = %id, "watchlist deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StockAdd>,
) -> Result<Json<Watchlist>, ApiError> {
    validate_stock_add(&req)?;
    let stock = Stock::new(req.symbol, req.name);
    let watchlist = state
        .storage
        .modify_stocks(&id, &user.id, |stocks| push_unique(stocks, stock))
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(watchlist.into()))
}

pub async fn remove_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, symbol)): Path<(String, String)>,
) -> Result<Json<Watchlist>, ApiError> {
    let watchlist = state
        .storage
        .modify_stocks(&id, &user.id, |stocks| {
            stocks.retain(|s| s.symbol != symbol);
            Ok(())
        })
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(watchlist.into()))
}

pub async fn create_from_index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<IndexWatchlistCreate>,
) -> Result<(StatusCode, Json<Watchlist>), ApiError> {
    let stocks = index_stocks(&req.index_name, &state.stocks()).await?;
    let name = req
        .watchlist_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| indices::default_watchlist_name(&req.index_name));
    let watchlist = DbWatchlist::new(
        &user.id,
        name,
        Some(indices::default_description(&req.index_name)),
        stocks,
    );
    state.storage.insert_watchlist(&watchlist).await?;
    info!(
        user_id = %user.id,
        index = %req.index_name,
        count = watchlist.stocks.len(),
        "watchlist created from index"
    );
    Ok((StatusCode::CREATED, Json(watchlist.into())))
}
