//! Business rules shared by the HTTP handlers.

pub mod spreadsheet;
pub mod stocks;
pub mod watchlists;

pub use stocks::StockLookup;
