use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::db::DbWatchlist;
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::router::AppState;
use crate::service::spreadsheet;
use crate::service::watchlists::merge_stocks;
use crate::types::Watchlist;

struct UploadForm {
    filename: String,
    bytes: Vec<u8>,
    watchlist_name: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut file = None;
    let mut watchlist_name = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                file = Some((filename, field.bytes().await?.to_vec()));
            }
            Some("watchlist_name") => {
                let text = field.text().await?;
                watchlist_name = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }
    let Some((filename, bytes)) = file else {
        return Err(ApiError::validation("file is required"));
    };
    Ok(UploadForm {
        filename,
        bytes,
        watchlist_name,
    })
}

pub async fn create_from_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Watchlist>), ApiError> {
    let form = read_form(multipart).await?;
    let stocks = spreadsheet::parse_stocks(&form.filename, &form.bytes)?;

    let name = form
        .watchlist_name
        .unwrap_or_else(|| format!("Imported from {}", form.filename));
    let description = format!("Imported from Excel file: {}", form.filename);
    let watchlist = DbWatchlist::new(&user.id, name, Some(description), stocks);
    state.storage.insert_watchlist(&watchlist).await?;
    info!(
        user_id = %user.id,
        file = %form.filename,
        count = watchlist.stocks.len(),
        "watchlist imported from spreadsheet"
    );
    Ok((StatusCode::CREATED, Json(watchlist.into())))
}

pub async fn append_from_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Watchlist>, ApiError> {
    if state.storage.get_watchlist(&id, &user.id).await?.is_none() {
        return Err(ApiError::not_found("Watchlist not found"));
    }
    let form = read_form(multipart).await?;
    let incoming = spreadsheet::parse_stocks(&form.filename, &form.bytes)?;

    let watchlist = state
        .storage
        .modify_stocks(&id, &user.id, |stocks| {
            if merge_stocks(stocks, incoming) == 0 {
                return Err(ApiError::Spreadsheet(
                    "No new valid stock symbols found in Excel file (all may already exist)"
                        .to_string(),
                ));
            }
            Ok(())
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Watchlist not found"))?;
    info!(user_id = %user.id, watchlist_id = %id, file = %form.filename, "spreadsheet appended");
    Ok(Json(watchlist.into()))
}
