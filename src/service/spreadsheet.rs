//! Turns an uploaded CSV or Excel sheet into watchlist entries.

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::debug;

use crate::error::ApiError;
use crate::types::Stock;

const SYMBOL_COLUMNS: &[&str] = &["symbol", "symbols", "stock", "stocks", "ticker", "tickers", "code"];
const NAME_COLUMNS: &[&str] = &["name", "company", "company_name", "stock_name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Excel,
}

impl SheetFormat {
    pub fn from_filename(filename: &str) -> Result<Self, ApiError> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv") {
            Ok(Self::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Ok(Self::Excel)
        } else {
            Err(ApiError::Spreadsheet(
                "File must be Excel (.xlsx, .xls) or CSV (.csv)".to_string(),
            ))
        }
    }
}

/// Parse `bytes` according to the extension of `filename`.
///
/// Symbols are deduplicated within the file and normalised to carry an
/// exchange suffix.
pub fn parse_stocks(filename: &str, bytes: &[u8]) -> Result<Vec<Stock>, ApiError> {
    let rows = match SheetFormat::from_filename(filename)? {
        SheetFormat::Csv => csv_rows(bytes)?,
        SheetFormat::Excel => excel_rows(bytes)?,
    };
    let stocks = rows_to_stocks(rows)?;
    debug!(filename, count = stocks.len(), "parsed spreadsheet");
    Ok(stocks)
}

fn processing_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::Spreadsheet(format!("Error processing Excel file: {e}"))
}

fn csv_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ApiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(processing_error)
        })
        .collect()
}

fn excel_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, ApiError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(processing_error)?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range.map_err(processing_error)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn find_column(header: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|wanted| header.iter().position(|h| h == wanted))
}

/// `tcs` -> `TCS.NS`; symbols already on NSE or BSE are kept.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || symbol == "NAN" || symbol == "NONE" {
        return None;
    }
    if symbol.ends_with(".NS") || symbol.ends_with(".BO") {
        Some(symbol)
    } else {
        Some(format!("{symbol}.NS"))
    }
}

fn rows_to_stocks(rows: Vec<Vec<String>>) -> Result<Vec<Stock>, ApiError> {
    let mut rows = rows
        .into_iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()));
    let Some(header) = rows.next() else {
        return Err(ApiError::Spreadsheet("Excel file is empty".to_string()));
    };
    let header: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

    let symbol_col = find_column(&header, SYMBOL_COLUMNS).ok_or_else(|| {
        ApiError::Spreadsheet(
            "Excel file must have a column named 'symbol', 'stock', or 'ticker'".to_string(),
        )
    })?;
    let name_col = find_column(&header, NAME_COLUMNS);

    let mut seen = HashSet::new();
    let mut stocks = Vec::new();
    for row in rows {
        let Some(symbol) = row.get(symbol_col).and_then(|s| normalize_symbol(s)) else {
            continue;
        };
        if !seen.insert(symbol.clone()) {
            continue;
        }
        let name = name_col
            .and_then(|i| row.get(i))
            .map(|n| n.trim())
            .filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("nan"))
            .map(str::to_string);
        stocks.push(Stock::new(symbol, name));
    }

    if stocks.is_empty() {
        return Err(ApiError::Spreadsheet(
            "No valid stock symbols found in Excel file".to_string(),
        ));
    }
    Ok(stocks)
}
